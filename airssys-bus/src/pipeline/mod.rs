//! Handler chain construction and execution.

pub mod builder;
pub mod chain;
pub mod inbox;

pub use builder::PipelineBuilder;
pub use chain::{AsyncHandlerChain, HandlerChain};
pub use inbox::{DuplicateAction, InMemoryInbox, Inbox, InboxConfiguration, InboxKey};
