//! Shared utilities for the bus runtime.

pub mod ids;

pub use ids::{CorrelationId, MessageId};
