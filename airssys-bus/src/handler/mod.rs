//! Handler and middleware abstractions for request dispatch.

pub mod factory;
pub mod middleware;
pub mod traits;

pub use factory::{
    AsyncHandlerFactory, AsyncMiddlewareFactory, FnAsyncHandlerFactory, FnAsyncMiddlewareFactory,
    FnHandlerFactory, FnMiddlewareFactory, HandlerFactory, MiddlewareFactory,
};
pub use middleware::{
    AsyncMiddleware, ChainOutcome, ErrorAction, Middleware, MiddlewareError, MiddlewareResult,
    Placement,
};
pub use traits::{AsyncHandler, Handler, HandlerTypeId};
