// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use crate::message::Message;

/// One staged outbound message.
///
/// Entries are keyed by message id and move monotonically from
/// undispatched to dispatched; the message itself is never mutated once
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    /// The staged message
    pub message: Message,

    /// When the entry was deposited
    pub deposited_at: DateTime<Utc>,

    /// When the entry was successfully produced, if it has been
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Create an undispatched entry deposited now
    pub fn new(message: Message) -> Self {
        Self {
            message,
            deposited_at: Utc::now(),
            dispatched_at: None,
        }
    }

    /// Returns true once the entry has been produced to the broker
    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    /// Age of the entry since deposit
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.deposited_at
    }
}

#[cfg(test)]
mod tests {
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
    fn test_fresh_entry_is_undispatched() {
        let entry = OutboxEntry::new(message());

        assert!(!entry.is_dispatched());
        assert!(entry.age().num_milliseconds() >= 0);
    }

    #[test]
    fn test_dispatch_marking() {
        let mut entry = OutboxEntry::new(message());
        entry.dispatched_at = Some(Utc::now());

        assert!(entry.is_dispatched());
    }
}
