//! Ephemeral reply channels for request-reply.
//!
//! The wire implementation of a channel lives outside the core; the
//! façade only needs creation, purge, and a blocking receive with a
//! budget. A channel is exclusively owned by the call that created it
//! and torn down by drop on every exit path.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::error::BusResult;
use crate::message::{ChannelName, Message, Topic};

/// Template for a broker subscription.
///
/// Reply subscriptions are registered per response type; at call time
/// the processor rewrites the channel name and routing key to the fresh
/// ephemeral channel id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Broker-side channel name
    pub channel_name: ChannelName,

    /// Routing key messages must match
    pub routing_key: Topic,
}

impl Subscription {
    /// Create a subscription template
    pub fn new(channel_name: ChannelName, routing_key: Topic) -> Self {
        Self {
            channel_name,
            routing_key,
        }
    }

    /// Rewrite both channel name and routing key to the given channel id.
    pub fn redirect(&self, channel: &ChannelName) -> Self {
        Self {
            channel_name: channel.clone(),
            routing_key: Topic::new(channel.as_str()),
        }
    }
}

/// Consuming side of one broker channel.
///
/// `receive` blocks up to the given budget and returns a `None`-typed
/// message as its timeout indicator rather than an error; transport
/// failures surface as errors and are retried by the caller's policy.
pub trait Channel: Send {
    /// Force broker-side creation and drop any stale messages
    fn purge(&mut self) -> BusResult<()>;

    /// Blocking receive with a budget
    fn receive(&mut self, timeout: Duration) -> BusResult<Message>;
}

/// Creates channels from subscriptions.
pub trait ChannelFactory: Send + Sync {
    /// Create a channel for the subscription
    fn create_channel(&self, subscription: &Subscription) -> BusResult<Box<dyn Channel>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_redirect() {
        let template = Subscription::new(ChannelName::new("replies"), Topic::new("replies"));
        let (channel, _token) = ChannelName::ephemeral();

        let redirected = template.redirect(&channel);
        assert_eq!(redirected.channel_name, channel);
        assert_eq!(redirected.routing_key.as_str(), channel.as_str());
    }
}
