//! Inbox deduplication for handler chains.
//!
//! The inbox records every request id a chain has processed; a repeat of
//! the same id is either skipped (short-circuit) or rejected. The
//! pipeline builder synthesizes the middleware per chain, scoping keys by
//! terminal handler so fan-out chains deduplicate independently.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// Layer 3: Internal module imports
use crate::context::RequestContext;
use crate::error::BusResult;
use crate::handler::{
    AsyncMiddleware, Middleware, MiddlewareError, MiddlewareResult, Placement,
};
use crate::request::Request;
use crate::util::MessageId;

/// Key identifying one processed request within one chain scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InboxKey {
    /// The request id
    pub request_id: MessageId,

    /// Scope of the deduplication, usually `<context>:<handler-type>`
    pub scope: String,
}

impl InboxKey {
    /// Create a key
    pub fn new(request_id: MessageId, scope: impl Into<String>) -> Self {
        Self {
            request_id,
            scope: scope.into(),
        }
    }
}

/// Store of processed request ids.
///
/// Durable implementations live outside the core; [`InMemoryInbox`] is
/// the in-process default.
pub trait Inbox: Send + Sync {
    /// Record a processed request
    fn add(&self, key: InboxKey) -> BusResult<()>;

    /// Returns true when the key has been recorded before
    fn contains(&self, key: &InboxKey) -> BusResult<bool>;
}

/// In-memory inbox backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryInbox {
    seen: DashMap<InboxKey, DateTime<Utc>>,
}

impl InMemoryInbox {
    /// Create an empty inbox
    pub fn new() -> Self {
        Self {
            seen: DashMap::new(),
        }
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true when nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Inbox for InMemoryInbox {
    fn add(&self, key: InboxKey) -> BusResult<()> {
        self.seen.entry(key).or_insert_with(Utc::now);
        Ok(())
    }

    fn contains(&self, key: &InboxKey) -> BusResult<bool> {
        Ok(self.seen.contains_key(key))
    }
}

/// What the inbox middleware does with a duplicate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Short-circuit the chain; the dispatch still succeeds
    Skip,

    /// Fail the chain with a middleware rejection
    Reject,
}

/// Configures the synthesized inbox middleware.
///
/// # Example
/// ```rust
/// use airssys_bus::pipeline::{DuplicateAction, InMemoryInbox, InboxConfiguration};
/// use std::sync::Arc;
///
/// let config = InboxConfiguration::new(Arc::new(InMemoryInbox::new()))
///     .with_action(DuplicateAction::Reject)
///     .with_context("orders");
/// assert_eq!(config.action(), DuplicateAction::Reject);
/// ```
#[derive(Clone)]
pub struct InboxConfiguration {
    inbox: Arc<dyn Inbox>,
    placement: Placement,
    step: i32,
    action: DuplicateAction,
    context: String,
}

impl InboxConfiguration {
    /// Configure inbox deduplication over the given store.
    ///
    /// Defaults: before the terminal at step 0, duplicates skipped,
    /// context `"bus"`.
    pub fn new(inbox: Arc<dyn Inbox>) -> Self {
        Self {
            inbox,
            placement: Placement::Before,
            step: 0,
            action: DuplicateAction::Skip,
            context: "bus".to_string(),
        }
    }

    /// Builder method: set the middleware position
    pub fn with_position(mut self, placement: Placement, step: i32) -> Self {
        self.placement = placement;
        self.step = step;
        self
    }

    /// Builder method: set the duplicate action
    pub fn with_action(mut self, action: DuplicateAction) -> Self {
        self.action = action;
        self
    }

    /// Builder method: set the context prefix for dedup keys
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// The backing store
    pub fn inbox(&self) -> &Arc<dyn Inbox> {
        &self.inbox
    }

    /// Where the synthesized middleware sits
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Ordering priority within the placement
    pub fn step(&self) -> i32 {
        self.step
    }

    /// What happens on a duplicate
    pub fn action(&self) -> DuplicateAction {
        self.action
    }

    /// Context prefix for dedup keys
    pub fn context(&self) -> &str {
        &self.context
    }
}

/// Synthesized deduplication middleware, one instance per chain.
pub(crate) struct InboxMiddleware {
    inbox: Arc<dyn Inbox>,
    action: DuplicateAction,
    scope: String,
}

impl InboxMiddleware {
    /// Build the middleware for one chain scope.
    pub(crate) fn for_chain(config: &InboxConfiguration, terminal: &str) -> Self {
        Self {
            inbox: Arc::clone(config.inbox()),
            action: config.action(),
            scope: format!("{}:{terminal}", config.context()),
        }
    }

    fn check<R: Request>(&self, request: R) -> MiddlewareResult<Option<R>> {
        let key = InboxKey::new(request.id(), self.scope.clone());
        let duplicate = self
            .inbox
            .contains(&key)
            .map_err(|e| MiddlewareError::failed(e.to_string()))?;

        if duplicate {
            trace!(request_id = %request.id(), scope = %self.scope, "duplicate request");
            return match self.action {
                DuplicateAction::Skip => Ok(None),
                DuplicateAction::Reject => Err(MiddlewareError::rejected(format!(
                    "duplicate request {}",
                    request.id()
                ))),
            };
        }

        self.inbox
            .add(key)
            .map_err(|e| MiddlewareError::failed(e.to_string()))?;
        Ok(Some(request))
    }
}

impl<R: Request> Middleware<R> for InboxMiddleware {
    fn name(&self) -> &str {
        "inbox"
    }

    fn before(&mut self, request: R, _context: &mut RequestContext) -> MiddlewareResult<Option<R>> {
        self.check(request)
    }
}

#[async_trait]
impl<R: Request> AsyncMiddleware<R> for InboxMiddleware {
    fn name(&self) -> &str {
        "inbox"
    }

    async fn before(
        &mut self,
        request: R,
        _context: &mut RequestContext,
        _cancel: &CancellationToken,
    ) -> MiddlewareResult<Option<R>> {
        self.check(request)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_in_memory_inbox_records_keys() {
        let inbox = InMemoryInbox::new();
        let key = InboxKey::new(MessageId::new(), "scope");

        assert!(!inbox.contains(&key).unwrap());
        inbox.add(key.clone()).unwrap();
        assert!(inbox.contains(&key).unwrap());
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_same_id_different_scope_is_distinct() {
        let inbox = InMemoryInbox::new();
        let id = MessageId::new();

        inbox.add(InboxKey::new(id, "a")).unwrap();
        assert!(!inbox.contains(&InboxKey::new(id, "b")).unwrap());
    }

    #[test]
    fn test_duplicate_add_keeps_first_entry() {
        let inbox = InMemoryInbox::new();
        let key = InboxKey::new(MessageId::new(), "scope");

        inbox.add(key.clone()).unwrap();
        inbox.add(key).unwrap();
        assert_eq!(inbox.len(), 1);
    }

    #[test]
    fn test_configuration_defaults() {
        let config = InboxConfiguration::new(Arc::new(InMemoryInbox::new()));

        assert_eq!(config.placement(), Placement::Before);
        assert_eq!(config.step(), 0);
        assert_eq!(config.action(), DuplicateAction::Skip);
        assert_eq!(config.context(), "bus");
    }

    #[test]
    fn test_middleware_scope_includes_terminal() {
        let config = InboxConfiguration::new(Arc::new(InMemoryInbox::new())).with_context("orders");
        let middleware = InboxMiddleware::for_chain(&config, "ship_handler");

        assert_eq!(middleware.scope, "orders:ship_handler");
    }
}
