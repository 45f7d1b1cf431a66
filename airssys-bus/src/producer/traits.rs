// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::error::BusResult;
use crate::message::Message;

/// Synchronous broker-facing sender.
///
/// Concrete drivers live outside the core; the bus wraps every `send` in
/// its resilience envelope, so implementations surface transport
/// failures plainly and leave retrying to the policies.
pub trait MessageProducer: Send + Sync {
    /// Produce a message to the broker
    fn send(&self, message: &Message) -> BusResult<()>;

    /// Produce a message after a broker-side delay.
    ///
    /// Brokers without native delay support fall back to an immediate
    /// send, which this default does.
    fn send_with_delay(&self, message: &Message, _delay: Duration) -> BusResult<()> {
        self.send(message)
    }
}

/// Asynchronous broker-facing sender.
#[async_trait]
pub trait AsyncMessageProducer: Send + Sync {
    /// Produce a message to the broker
    async fn send(&self, message: &Message, cancel: &CancellationToken) -> BusResult<()>;

    /// Produce a message after a broker-side delay
    async fn send_with_delay(
        &self,
        message: &Message,
        _delay: Duration,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        self.send(message, cancel).await
    }
}
