//! Fluent construction of the external bus.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::service::{ExternalBus, PublicationCallback};
use crate::outbox::{AsyncOutbox, Outbox, TransactionProvider};
use crate::producer::{AsyncMessageProducer, MessageProducer};
use crate::registry::PolicyRegistry;
use crate::util::MessageId;

/// Default budget for one outbox write.
const DEFAULT_OUTBOX_TIMEOUT: Duration = Duration::from_millis(300);

/// Builder for [`ExternalBus`] instances.
///
/// Implementations may provide the sync variant, the async variant, or
/// both of each collaborator; operations that hit a missing variant fail
/// with a configuration error at the call site.
///
/// # Examples
///
/// ```rust
/// use airssys_bus::bus::ExternalBus;
/// use airssys_bus::outbox::InMemoryOutbox;
/// use airssys_bus::producer::InMemoryMessageProducer;
/// use std::sync::Arc;
///
/// let bus = ExternalBus::builder()
///     .with_outbox(Arc::new(InMemoryOutbox::new()))
///     .with_producer(Arc::new(InMemoryMessageProducer::new()))
///     .build();
/// assert!(bus.has_sync_outbox());
/// ```
#[derive(Default)]
pub struct ExternalBusBuilder {
    outbox: Option<Arc<dyn Outbox>>,
    async_outbox: Option<Arc<dyn AsyncOutbox>>,
    producer: Option<Arc<dyn MessageProducer>>,
    async_producer: Option<Arc<dyn AsyncMessageProducer>>,
    policies: Option<Arc<PolicyRegistry>>,
    outbox_timeout: Option<Duration>,
    transaction_provider: Option<Arc<dyn TransactionProvider>>,
    on_published: Vec<PublicationCallback>,
}

impl ExternalBusBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the synchronous outbox
    pub fn with_outbox(mut self, outbox: Arc<dyn Outbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Configure the asynchronous outbox
    pub fn with_async_outbox(mut self, outbox: Arc<dyn AsyncOutbox>) -> Self {
        self.async_outbox = Some(outbox);
        self
    }

    /// Configure the synchronous producer
    pub fn with_producer(mut self, producer: Arc<dyn MessageProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Configure the asynchronous producer
    pub fn with_async_producer(mut self, producer: Arc<dyn AsyncMessageProducer>) -> Self {
        self.async_producer = Some(producer);
        self
    }

    /// Configure the policy registry backing the resilience envelope.
    ///
    /// Defaults to [`PolicyRegistry::with_defaults`], which installs
    /// pass-through policies under every reserved name.
    pub fn with_policies(mut self, policies: Arc<PolicyRegistry>) -> Self {
        self.policies = Some(policies);
        self
    }

    /// Configure the outbox write timeout
    pub fn with_outbox_timeout(mut self, timeout: Duration) -> Self {
        self.outbox_timeout = Some(timeout);
        self
    }

    /// Tie outbox writes to the caller's database transaction
    pub fn with_transaction_provider(mut self, provider: Arc<dyn TransactionProvider>) -> Self {
        self.transaction_provider = Some(provider);
        self
    }

    /// Register a callback fired after each successful produce
    pub fn on_published(
        mut self,
        callback: impl Fn(&MessageId, DateTime<Utc>) + Send + Sync + 'static,
    ) -> Self {
        self.on_published.push(Arc::new(callback));
        self
    }

    /// Build the external bus
    pub fn build(self) -> ExternalBus {
        ExternalBus {
            outbox: self.outbox,
            async_outbox: self.async_outbox,
            producer: self.producer,
            async_producer: self.async_producer,
            policies: self
                .policies
                .unwrap_or_else(|| Arc::new(PolicyRegistry::with_defaults())),
            outbox_timeout: self.outbox_timeout.unwrap_or(DEFAULT_OUTBOX_TIMEOUT),
            transaction_provider: self.transaction_provider,
            on_published: self.on_published,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build() {
        let bus = ExternalBusBuilder::new().build();

        assert!(!bus.has_sync_outbox());
        assert!(!bus.has_async_outbox());
        assert_eq!(bus.outbox_timeout(), DEFAULT_OUTBOX_TIMEOUT);
    }

    #[test]
    fn test_timeout_override() {
        let bus = ExternalBusBuilder::new()
            .with_outbox_timeout(Duration::from_secs(2))
            .build();

        assert_eq!(bus.outbox_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_default_policies_cover_reserved_names() {
        use crate::policy::names;

        let bus = ExternalBusBuilder::new().build();
        assert!(bus.policies().policy(names::RETRY_POLICY).is_some());
        assert!(bus.policies().policy(names::CIRCUIT_BREAKER).is_some());
    }
}
