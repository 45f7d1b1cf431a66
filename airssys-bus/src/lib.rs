//! # airssys-bus - Command Dispatcher and Message-Bus Mediator
//!
//! In-process command dispatcher unifying three messaging patterns under
//! one façade: typed in-memory dispatch, an outbox-backed external bus
//! for reliable broker publication, and blocking request-reply over that
//! bus.
//!
//! # Quick Start
//!
//! ```rust
//! use airssys_bus::prelude::*;
//! use std::sync::Arc;
//!
//! // 1. Define your request type
//! #[derive(Debug, Clone)]
//! struct PlaceOrder {
//!     id: MessageId,
//!     sku: String,
//! }
//!
//! impl Request for PlaceOrder {
//!     const REQUEST_TYPE: &'static str = "place_order";
//!     fn id(&self) -> MessageId {
//!         self.id
//!     }
//! }
//!
//! // 2. Define your handler
//! struct PlaceOrderHandler;
//!
//! impl Handler<PlaceOrder> for PlaceOrderHandler {
//!     fn name(&self) -> &str {
//!         "place_order_handler"
//!     }
//!
//!     fn handle(&mut self, request: PlaceOrder, _ctx: &mut RequestContext) -> BusResult<PlaceOrder> {
//!         // business logic here
//!         Ok(request)
//!     }
//! }
//!
//! // 3. Register and dispatch
//! let subscribers = Arc::new(SubscriberRegistry::new());
//! subscribers.register(HandlerRegistration::sync(
//!     "place_order_handler",
//!     FnHandlerFactory::new(|| PlaceOrderHandler),
//! ));
//!
//! let processor = CommandProcessor::builder()
//!     .with_subscribers(subscribers)
//!     .build();
//!
//! processor.send(PlaceOrder { id: MessageId::new(), sku: "A-1".into() }).unwrap();
//! ```
//!
//! # Dispatch Semantics
//!
//! - **send / send_async** — a command goes to exactly one handler;
//!   any other count is a contract violation and handler errors
//!   propagate unchanged.
//! - **publish / publish_async** — an event fans out to every handler
//!   sequentially in registration order; failures are collected into one
//!   aggregate error and zero handlers is a no-op success.
//! - **deposit / clear / post** — durable store-and-forward: deposit
//!   stages the mapped message in the outbox (optionally inside the
//!   caller's transaction), clear produces staged entries to the broker
//!   under retry nested inside a circuit breaker, post is both back to
//!   back. Delivery is at-least-once.
//! - **call** — blocking request-reply: an ephemeral reply channel is
//!   created per call, the reply is accepted only when its correlation
//!   id matches, and the received response is locally dispatched as a
//!   send before being returned.
//!
//! # Module Organization
//!
//! ## Dispatch Core
//! - [`processor`] - The façade and its builder
//! - [`pipeline`] - Chain construction, execution, and inbox dedup
//! - [`handler`] - Handler, middleware, and factory traits
//! - [`registry`] - Subscriber, mapper, and policy registries
//!
//! ## External Bus
//! - [`bus`] - The bus service, its builder, and the process handle
//! - [`outbox`] - Durable staging store traits and the in-memory store
//! - [`producer`] - Broker-facing sender traits and the in-memory sender
//! - [`channel`] - Reply channel abstractions for request-reply
//!
//! ## Shared Model
//! - [`request`] - Request traits and reply addresses
//! - [`message`] - Wire message model and mappers
//! - [`context`] - Per-dispatch propagation context
//! - [`policy`] - Retry and circuit-breaker policies
//! - [`switches`] - Feature switches and the gate middleware
//! - [`error`] - The error taxonomy
//! - [`util`] - Ids and shared helpers
//!
//! # Concurrency Model
//!
//! Sync operations run entirely on the caller's thread; async operations
//! suspend only at handler, outbox, producer, policy, and channel
//! boundaries, and accept a `CancellationToken` that is honored before
//! the first suspension point. Handlers are per-invocation instances and
//! never shared; registries and the bus are thread-safe.

pub mod bus;
pub mod channel;
pub mod context;
pub mod error;
pub mod handler;
pub mod message;
pub mod outbox;
pub mod pipeline;
pub mod policy;
pub mod prelude;
pub mod processor;
pub mod producer;
pub mod registry;
pub mod request;
pub mod switches;
pub mod util;

// Re-export commonly used types
pub use bus::{ExternalBus, ExternalBusBuilder};
pub use channel::{Channel, ChannelFactory, Subscription};
pub use context::RequestContext;
pub use error::{BusError, BusResult};
pub use handler::{
    AsyncHandler, AsyncHandlerFactory, AsyncMiddleware, AsyncMiddlewareFactory, ChainOutcome,
    ErrorAction, FnAsyncHandlerFactory, FnAsyncMiddlewareFactory, FnHandlerFactory,
    FnMiddlewareFactory, Handler, HandlerFactory, HandlerTypeId, Middleware, MiddlewareError,
    MiddlewareFactory, MiddlewareResult, Placement,
};
pub use message::{
    ChannelName, JsonMessageMapper, Message, MessageBody, MessageHeader, MessageMapper,
    MessageType, Topic,
};
pub use outbox::{AsyncOutbox, InMemoryOutbox, Outbox, OutboxEntry, TransactionConnection, TransactionProvider};
pub use pipeline::{
    AsyncHandlerChain, DuplicateAction, HandlerChain, InMemoryInbox, Inbox, InboxConfiguration,
    InboxKey, PipelineBuilder,
};
pub use policy::{AsyncPolicy, CircuitBreaker, NoopPolicy, Policy, RetryPolicy};
pub use processor::{CommandProcessor, CommandProcessorBuilder};
pub use producer::{AsyncMessageProducer, InMemoryMessageProducer, MessageProducer};
pub use registry::{
    HandlerRegistration, MapperRegistry, MiddlewareRegistration, PolicyRegistry,
    SubscriberRegistry,
};
pub use request::{Call, ReplyAddress, Request};
pub use switches::{FeatureGateMiddleware, FeatureSwitches, SwitchStatus};
pub use util::{CorrelationId, MessageId};
