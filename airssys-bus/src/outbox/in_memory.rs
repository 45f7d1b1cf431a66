//! In-memory outbox backed by a concurrent map.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// Layer 3: Internal module imports
use super::entry::OutboxEntry;
use super::traits::{AsyncOutbox, Outbox, TransactionConnection};
use crate::error::BusResult;
use crate::message::Message;
use crate::util::MessageId;

/// In-memory outbox implementing both store variants.
///
/// Entries are deduplicated by message id: a second add of an id keeps
/// the first entry, preserving the monotone dispatch transition. The
/// transaction connection is accepted and ignored; an in-process map has
/// no transaction to join.
///
/// # Example
/// ```rust
/// use airssys_bus::message::{Message, MessageBody, MessageHeader, MessageType, Topic};
/// use airssys_bus::outbox::{InMemoryOutbox, Outbox};
/// use airssys_bus::util::MessageId;
/// use std::time::Duration;
///
/// let outbox = InMemoryOutbox::new();
/// let message = Message::new(
///     MessageHeader::new(MessageId::new(), Topic::new("t"), MessageType::Event),
///     MessageBody::empty(),
/// );
/// outbox.add(&message, Duration::from_secs(1), None).unwrap();
/// assert!(outbox.get(&message.id()).unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    entries: DashMap<MessageId, OutboxEntry>,
}

impl InMemoryOutbox {
    /// Create an empty outbox
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of staged entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is staged
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add_entry(&self, message: &Message) {
        self.entries
            .entry(message.id())
            .or_insert_with(|| OutboxEntry::new(message.clone()));
    }

    fn get_entry(&self, id: &MessageId) -> Option<OutboxEntry> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    fn mark(&self, id: &MessageId, at: DateTime<Utc>) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            if entry.dispatched_at.is_none() {
                trace!(%id, "outbox entry dispatched");
                entry.dispatched_at = Some(at);
            }
        }
    }

    fn outstanding(&self, older_than: Duration, batch_size: usize) -> Vec<Message> {
        let cutoff = chrono::Duration::from_std(older_than)
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        let mut candidates: Vec<OutboxEntry> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_dispatched() && entry.age() >= cutoff)
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by_key(|entry| entry.deposited_at);
        candidates
            .into_iter()
            .take(batch_size)
            .map(|entry| entry.message)
            .collect()
    }
}

impl Outbox for InMemoryOutbox {
    fn add(
        &self,
        message: &Message,
        _timeout: Duration,
        _conn: Option<&dyn TransactionConnection>,
    ) -> BusResult<()> {
        self.add_entry(message);
        Ok(())
    }

    fn get(&self, id: &MessageId) -> BusResult<Option<OutboxEntry>> {
        Ok(self.get_entry(id))
    }

    fn mark_dispatched(&self, id: &MessageId, at: DateTime<Utc>) -> BusResult<()> {
        self.mark(id, at);
        Ok(())
    }

    fn outstanding_messages(
        &self,
        older_than: Duration,
        batch_size: usize,
    ) -> BusResult<Vec<Message>> {
        Ok(self.outstanding(older_than, batch_size))
    }
}

#[async_trait]
impl AsyncOutbox for InMemoryOutbox {
    async fn add(
        &self,
        message: &Message,
        _timeout: Duration,
        _conn: Option<&dyn TransactionConnection>,
        _cancel: &CancellationToken,
    ) -> BusResult<()> {
        self.add_entry(message);
        Ok(())
    }

    async fn get(&self, id: &MessageId) -> BusResult<Option<OutboxEntry>> {
        Ok(self.get_entry(id))
    }

    async fn mark_dispatched(&self, id: &MessageId, at: DateTime<Utc>) -> BusResult<()> {
        self.mark(id, at);
        Ok(())
    }

    async fn outstanding_messages(
        &self,
        older_than: Duration,
        batch_size: usize,
    ) -> BusResult<Vec<Message>> {
        Ok(self.outstanding(older_than, batch_size))
    }
}
