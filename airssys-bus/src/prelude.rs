//! Convenience re-exports for the common surface.
//!
//! ```rust
//! use airssys_bus::prelude::*;
//! ```

pub use crate::bus::{ExternalBus, ExternalBusBuilder};
pub use crate::channel::{Channel, ChannelFactory, Subscription};
pub use crate::context::RequestContext;
pub use crate::error::{BusError, BusResult};
pub use crate::handler::{
    AsyncHandler, AsyncHandlerFactory, FnAsyncHandlerFactory, FnHandlerFactory,
    FnMiddlewareFactory, Handler, HandlerFactory, HandlerTypeId, Middleware, MiddlewareFactory,
    MiddlewareResult, Placement,
};
pub use crate::message::{
    ChannelName, JsonMessageMapper, Message, MessageBody, MessageHeader, MessageMapper,
    MessageType, Topic,
};
pub use crate::outbox::{InMemoryOutbox, Outbox};
pub use crate::pipeline::{DuplicateAction, InMemoryInbox, InboxConfiguration};
pub use crate::policy::{names as policy_names, CircuitBreaker, RetryPolicy};
pub use crate::processor::CommandProcessor;
pub use crate::producer::{InMemoryMessageProducer, MessageProducer};
pub use crate::registry::{
    HandlerRegistration, MapperRegistry, MiddlewareRegistration, PolicyRegistry,
    SubscriberRegistry,
};
pub use crate::request::{Call, ReplyAddress, Request};
pub use crate::switches::{FeatureSwitches, SwitchStatus};
pub use crate::util::{CorrelationId, MessageId};
