//! Feature switches and the feature-gate middleware.
//!
//! Switches let deployments turn individual middleware or whole handler
//! paths off without re-registering anything. Switch state flows through
//! the request context; it never changes handler-count validation.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// Layer 3: Internal module imports
use crate::context::RequestContext;
use crate::handler::{AsyncMiddleware, Middleware, MiddlewareResult};
use crate::request::Request;

/// State of a named feature switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStatus {
    /// Feature is enabled
    On,
    /// Feature is disabled
    Off,
}

/// Registry of named feature switches.
///
/// # Example
/// ```rust
/// use airssys_bus::switches::{FeatureSwitches, SwitchStatus};
///
/// let switches = FeatureSwitches::new();
/// switches.set("audit-log", SwitchStatus::Off);
/// assert_eq!(switches.is_on("audit-log"), Some(false));
/// assert_eq!(switches.is_on("unknown"), None);
/// ```
#[derive(Debug, Default)]
pub struct FeatureSwitches {
    switches: DashMap<String, SwitchStatus>,
}

impl FeatureSwitches {
    /// Create an empty switch registry
    pub fn new() -> Self {
        Self {
            switches: DashMap::new(),
        }
    }

    /// Set a switch state
    pub fn set(&self, name: impl Into<String>, status: SwitchStatus) {
        self.switches.insert(name.into(), status);
    }

    /// Look up a switch: `Some(true)` when on, `Some(false)` when off,
    /// `None` when the switch has never been set
    pub fn is_on(&self, name: &str) -> Option<bool> {
        self.switches
            .get(name)
            .map(|entry| *entry.value() == SwitchStatus::On)
    }
}

/// Middleware that short-circuits its chain while a switch is off.
///
/// An unset switch falls back to `default_on`. Short-circuiting skips
/// the terminal handler for this chain only; other chains of the same
/// dispatch run normally.
#[derive(Debug, Clone)]
pub struct FeatureGateMiddleware {
    switch: String,
    default_on: bool,
}

impl FeatureGateMiddleware {
    /// Gate a chain on the named switch, treating unset as on
    pub fn new(switch: impl Into<String>) -> Self {
        Self {
            switch: switch.into(),
            default_on: true,
        }
    }

    /// Treat an unset switch as off instead
    pub fn default_off(mut self) -> Self {
        self.default_on = false;
        self
    }

    fn is_enabled(&self, context: &RequestContext) -> bool {
        context
            .feature_switches()
            .and_then(|switches| switches.is_on(&self.switch))
            .unwrap_or(self.default_on)
    }
}

impl<R: Request> Middleware<R> for FeatureGateMiddleware {
    fn name(&self) -> &str {
        "feature_gate"
    }

    fn before(&mut self, request: R, context: &mut RequestContext) -> MiddlewareResult<Option<R>> {
        if self.is_enabled(context) {
            Ok(Some(request))
        } else {
            trace!(switch = %self.switch, "feature switch off, skipping chain");
            Ok(None)
        }
    }
}

#[async_trait]
impl<R: Request> AsyncMiddleware<R> for FeatureGateMiddleware {
    fn name(&self) -> &str {
        "feature_gate"
    }

    async fn before(
        &mut self,
        request: R,
        context: &mut RequestContext,
        _cancel: &CancellationToken,
    ) -> MiddlewareResult<Option<R>> {
        if self.is_enabled(context) {
            Ok(Some(request))
        } else {
            trace!(switch = %self.switch, "feature switch off, skipping chain");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_states() {
        let switches = FeatureSwitches::new();

        assert_eq!(switches.is_on("missing"), None);

        switches.set("a", SwitchStatus::On);
        switches.set("b", SwitchStatus::Off);
        assert_eq!(switches.is_on("a"), Some(true));
        assert_eq!(switches.is_on("b"), Some(false));
    }

    #[test]
    fn test_switch_overwrite() {
        let switches = FeatureSwitches::new();
        switches.set("a", SwitchStatus::On);
        switches.set("a", SwitchStatus::Off);

        assert_eq!(switches.is_on("a"), Some(false));
    }
}
