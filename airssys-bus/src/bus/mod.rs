//! External bus service coordinating outbox, producer, and policies.

pub mod builder;
pub mod handle;
pub mod service;

pub use builder::ExternalBusBuilder;
pub use service::{ExternalBus, PublicationCallback};
