//! Policy registry: named resilience policies.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::policy::{names, AsyncPolicy, NoopPolicy, Policy};

/// Named sync and async resilience policies.
///
/// The external bus resolves its envelope through the reserved names in
/// [`crate::policy::names`]; anything else is free for application use.
///
/// # Example
/// ```rust
/// use airssys_bus::policy::{names, RetryPolicy};
/// use airssys_bus::registry::PolicyRegistry;
/// use std::time::Duration;
///
/// let registry = PolicyRegistry::with_defaults();
/// registry.register(
///     names::RETRY_POLICY,
///     RetryPolicy::new(5, Duration::from_millis(20), Duration::from_secs(1)),
/// );
/// assert!(registry.policy(names::RETRY_POLICY).is_some());
/// ```
#[derive(Default)]
pub struct PolicyRegistry {
    sync_policies: DashMap<String, Arc<dyn Policy>>,
    async_policies: DashMap<String, Arc<dyn AsyncPolicy>>,
}

impl PolicyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sync_policies: DashMap::new(),
            async_policies: DashMap::new(),
        }
    }

    /// Create a registry with pass-through policies under every reserved
    /// name, so the bus works before any real policies are configured.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(names::CIRCUIT_BREAKER, NoopPolicy);
        registry.register(names::RETRY_POLICY, NoopPolicy);
        registry.register_async(names::CIRCUIT_BREAKER_ASYNC, NoopPolicy);
        registry.register_async(names::RETRY_POLICY_ASYNC, NoopPolicy);
        registry
    }

    /// Register a sync policy under a name, replacing any previous one.
    pub fn register(&self, name: impl Into<String>, policy: impl Policy + 'static) {
        self.sync_policies.insert(name.into(), Arc::new(policy));
    }

    /// Register an async policy under a name, replacing any previous one.
    pub fn register_async(&self, name: impl Into<String>, policy: impl AsyncPolicy + 'static) {
        self.async_policies.insert(name.into(), Arc::new(policy));
    }

    /// Look up a sync policy by name.
    pub fn policy(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.sync_policies.get(name).map(|p| Arc::clone(p.value()))
    }

    /// Look up an async policy by name.
    pub fn async_policy(&self, name: &str) -> Option<Arc<dyn AsyncPolicy>> {
        self.async_policies.get(name).map(|p| Arc::clone(p.value()))
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("sync_policies", &self.sync_policies.len())
            .field("async_policies", &self.async_policies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = PolicyRegistry::new();
        assert!(registry.policy(names::RETRY_POLICY).is_none());
        assert!(registry.async_policy(names::RETRY_POLICY_ASYNC).is_none());
    }

    #[test]
    fn test_defaults_cover_reserved_names() {
        let registry = PolicyRegistry::with_defaults();

        assert!(registry.policy(names::CIRCUIT_BREAKER).is_some());
        assert!(registry.policy(names::RETRY_POLICY).is_some());
        assert!(registry.async_policy(names::CIRCUIT_BREAKER_ASYNC).is_some());
        assert!(registry.async_policy(names::RETRY_POLICY_ASYNC).is_some());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = PolicyRegistry::with_defaults();
        registry.register(names::RETRY_POLICY, NoopPolicy);

        assert!(registry.policy(names::RETRY_POLICY).is_some());
    }

    #[test]
    fn test_custom_names_allowed() {
        let registry = PolicyRegistry::new();
        registry.register("mine", NoopPolicy);

        assert!(registry.policy("mine").is_some());
        assert!(registry.policy("other").is_none());
    }
}
