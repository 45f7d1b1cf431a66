//! Lookup registries keyed by request type.

pub mod mappers;
pub mod policies;
pub mod subscribers;

pub use mappers::MapperRegistry;
pub use policies::PolicyRegistry;
pub use subscribers::{HandlerRegistration, MiddlewareRegistration, SubscriberRegistry};
