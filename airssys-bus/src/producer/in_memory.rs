//! In-memory producer recording everything it sends.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use super::traits::{AsyncMessageProducer, MessageProducer};
use crate::error::BusResult;
use crate::message::Message;

/// Producer that appends every sent message to an in-process log.
///
/// The zero-broker default: useful in tests and for local development
/// where the consuming side runs in the same process and polls
/// [`sent_messages`](InMemoryMessageProducer::sent_messages).
#[derive(Debug, Default)]
pub struct InMemoryMessageProducer {
    sent: Mutex<Vec<Message>>,
}

impl InMemoryMessageProducer {
    /// Create an empty producer
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every message sent so far, in send order
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Number of messages sent
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    fn record(&self, message: &Message) {
        self.sent.lock().push(message.clone());
    }
}

impl MessageProducer for InMemoryMessageProducer {
    fn send(&self, message: &Message) -> BusResult<()> {
        self.record(message);
        Ok(())
    }
}

#[async_trait]
impl AsyncMessageProducer for InMemoryMessageProducer {
    async fn send(&self, message: &Message, _cancel: &CancellationToken) -> BusResult<()> {
        self.record(message);
        Ok(())
    }

    async fn send_with_delay(
        &self,
        message: &Message,
        delay: Duration,
        _cancel: &CancellationToken,
    ) -> BusResult<()> {
        tokio::time::sleep(delay).await;
        self.record(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::message::{MessageBody, MessageHeader, MessageType, Topic};
    use crate::util::MessageId;

    fn message() -> Message {
        Message::new(
            MessageHeader::new(MessageId::new(), Topic::new("t"), MessageType::Event),
            MessageBody::empty(),
        )
    }

    #[test]
    fn test_send_records_in_order() {
        let producer = InMemoryMessageProducer::new();
        let first = message();
        let second = message();

        MessageProducer::send(&producer, &first).unwrap();
        MessageProducer::send(&producer, &second).unwrap();

        let sent = producer.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id(), first.id());
        assert_eq!(sent[1].id(), second.id());
    }

    #[tokio::test]
    async fn test_async_send_shares_the_log() {
        let producer = InMemoryMessageProducer::new();
        let cancel = CancellationToken::new();

        AsyncMessageProducer::send(&producer, &message(), &cancel)
            .await
            .unwrap();

        assert_eq!(producer.sent_count(), 1);
    }
}
