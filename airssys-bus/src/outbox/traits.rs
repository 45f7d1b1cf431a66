// Layer 1: Standard library imports
use std::any::Any;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use super::entry::OutboxEntry;
use crate::error::BusResult;
use crate::message::Message;
use crate::util::MessageId;

/// Opaque handle to a caller-owned database transaction.
///
/// The core never inspects the connection; it only threads the handle
/// into the outbox write so a durable implementation can join the
/// caller's transaction. Concrete stores downcast via [`Any`].
pub trait TransactionConnection: Send + Sync {
    /// Downcast support for concrete stores
    fn as_any(&self) -> &dyn Any;
}

/// Supplies the caller transaction for transactional deposits.
///
/// When configured on the external bus, every outbox write goes through
/// the provider's current connection, making the deposit visible only
/// when the caller commits.
pub trait TransactionProvider: Send + Sync {
    /// The connection carrying the caller's open transaction
    fn connection(&self) -> Box<dyn TransactionConnection>;
}

/// Synchronous durable store of outbound messages, keyed by message id.
///
/// Implementations deduplicate by id and keep the undispatched to
/// dispatched transition monotone. Duplicate produces of one id are
/// tolerated downstream, so `get` exposes the dispatch state and lets
/// the clear protocol skip already-dispatched entries.
pub trait Outbox: Send + Sync {
    /// Stage a message. `conn`, when present, carries the caller's
    /// transaction and the write must go through it.
    fn add(
        &self,
        message: &Message,
        timeout: Duration,
        conn: Option<&dyn TransactionConnection>,
    ) -> BusResult<()>;

    /// Load an entry by id
    fn get(&self, id: &MessageId) -> BusResult<Option<OutboxEntry>>;

    /// Record a successful produce. No-op once the entry is dispatched.
    fn mark_dispatched(&self, id: &MessageId, at: DateTime<Utc>) -> BusResult<()>;

    /// Undispatched messages at least `older_than` old, up to
    /// `batch_size` of them, oldest first.
    fn outstanding_messages(
        &self,
        older_than: Duration,
        batch_size: usize,
    ) -> BusResult<Vec<Message>>;
}

/// Asynchronous durable store of outbound messages.
///
/// Mirrors [`Outbox`]; the cancellation token is observed at the store's
/// own suspension points.
#[async_trait]
pub trait AsyncOutbox: Send + Sync {
    /// Stage a message
    async fn add(
        &self,
        message: &Message,
        timeout: Duration,
        conn: Option<&dyn TransactionConnection>,
        cancel: &CancellationToken,
    ) -> BusResult<()>;

    /// Load an entry by id
    async fn get(&self, id: &MessageId) -> BusResult<Option<OutboxEntry>>;

    /// Record a successful produce. No-op once the entry is dispatched.
    async fn mark_dispatched(&self, id: &MessageId, at: DateTime<Utc>) -> BusResult<()>;

    /// Undispatched messages at least `older_than` old, up to
    /// `batch_size` of them, oldest first.
    async fn outstanding_messages(
        &self,
        older_than: Duration,
        batch_size: usize,
    ) -> BusResult<Vec<Message>>;
}
