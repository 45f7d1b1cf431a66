//! Fluent construction of the command processor.

// Layer 1: Standard library imports
use std::any::TypeId;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::processor::CommandProcessor;
use crate::bus::ExternalBus;
use crate::channel::{ChannelFactory, Subscription};
use crate::pipeline::InboxConfiguration;
use crate::registry::{MapperRegistry, PolicyRegistry, SubscriberRegistry};
use crate::request::Request;
use crate::switches::FeatureSwitches;

/// Builder for [`CommandProcessor`] instances.
///
/// Only the collaborators a deployment needs are configured; operations
/// that reach for a missing one fail with a configuration error at the
/// call site, never at build time.
///
/// # Examples
///
/// ```rust
/// use airssys_bus::processor::CommandProcessor;
/// use airssys_bus::registry::SubscriberRegistry;
/// use std::sync::Arc;
///
/// let processor = CommandProcessor::builder()
///     .with_subscribers(Arc::new(SubscriberRegistry::new()))
///     .build();
/// ```
#[derive(Default)]
pub struct CommandProcessorBuilder {
    subscribers: Option<Arc<SubscriberRegistry>>,
    mappers: Option<Arc<MapperRegistry>>,
    policies: Option<Arc<PolicyRegistry>>,
    feature_switches: Option<Arc<FeatureSwitches>>,
    inbox: Option<InboxConfiguration>,
    bus: Option<Arc<ExternalBus>>,
    channel_factory: Option<Arc<dyn ChannelFactory>>,
    reply_subscriptions: Vec<(TypeId, Subscription)>,
}

impl CommandProcessorBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the subscriber registry
    pub fn with_subscribers(mut self, subscribers: Arc<SubscriberRegistry>) -> Self {
        self.subscribers = Some(subscribers);
        self
    }

    /// Configure the mapper registry
    pub fn with_mappers(mut self, mappers: Arc<MapperRegistry>) -> Self {
        self.mappers = Some(mappers);
        self
    }

    /// Configure the policy registry handed to request contexts.
    ///
    /// Defaults to [`PolicyRegistry::with_defaults`].
    pub fn with_policies(mut self, policies: Arc<PolicyRegistry>) -> Self {
        self.policies = Some(policies);
        self
    }

    /// Configure feature switches propagated through request contexts
    pub fn with_feature_switches(mut self, switches: Arc<FeatureSwitches>) -> Self {
        self.feature_switches = Some(switches);
        self
    }

    /// Enable inbox deduplication for every chain that has not opted out
    pub fn with_inbox(mut self, inbox: InboxConfiguration) -> Self {
        self.inbox = Some(inbox);
        self
    }

    /// Configure the external bus for post, deposit, clear, and call
    pub fn with_external_bus(mut self, bus: Arc<ExternalBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Configure the channel factory for request-reply
    pub fn with_channel_factory(mut self, factory: Arc<dyn ChannelFactory>) -> Self {
        self.channel_factory = Some(factory);
        self
    }

    /// Register a reply subscription template for a response type
    pub fn with_reply_subscription<R: Request>(mut self, subscription: Subscription) -> Self {
        self.reply_subscriptions
            .push((TypeId::of::<R>(), subscription));
        self
    }

    /// Build the processor
    pub fn build(self) -> CommandProcessor {
        let reply_subscriptions = DashMap::new();
        for (type_id, subscription) in self.reply_subscriptions {
            reply_subscriptions.insert(type_id, subscription);
        }

        CommandProcessor {
            subscribers: self
                .subscribers
                .unwrap_or_else(|| Arc::new(SubscriberRegistry::new())),
            mappers: self.mappers.unwrap_or_else(|| Arc::new(MapperRegistry::new())),
            policies: self
                .policies
                .unwrap_or_else(|| Arc::new(PolicyRegistry::with_defaults())),
            feature_switches: self.feature_switches,
            inbox: self.inbox,
            bus: self.bus,
            channel_factory: self.channel_factory,
            reply_subscriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_build_has_empty_registries() {
        #[derive(Debug, Clone)]
        struct Probe {
            id: crate::util::MessageId,
        }

        impl Request for Probe {
            const REQUEST_TYPE: &'static str = "probe";

            fn id(&self) -> crate::util::MessageId {
                self.id
            }
        }

        let processor = CommandProcessorBuilder::new().build();
        assert_eq!(processor.subscribers().handler_count::<Probe>(), 0);
    }

    #[test]
    fn test_operations_without_bus_fail_with_configuration() {
        let processor = CommandProcessorBuilder::new().build();
        let err = processor.clear(&[crate::util::MessageId::new()]).unwrap_err();
        assert!(err.is_configuration());
    }
}
