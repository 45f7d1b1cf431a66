//! Durable store-and-forward staging for outbound messages.

pub mod entry;
pub mod in_memory;
pub mod traits;

pub use entry::OutboxEntry;
pub use in_memory::InMemoryOutbox;
pub use traits::{AsyncOutbox, Outbox, TransactionConnection, TransactionProvider};
