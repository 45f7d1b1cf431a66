//! Handler and middleware factories.
//!
//! The pipeline builder constructs every handler instance through a
//! factory and hands each one back through `release` when the chain is
//! torn down, in reverse construction order, on every exit path. The
//! default `release` simply drops; factories backed by pools or scopes
//! override it.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::middleware::{AsyncMiddleware, Middleware};
use super::traits::{AsyncHandler, Handler};
use crate::request::Request;

/// Factory for synchronous terminal handlers.
pub trait HandlerFactory<R: Request>: Send + Sync {
    /// Construct a fresh handler instance for one dispatch
    fn create(&self) -> Box<dyn Handler<R>>;

    /// Release a handler created by this factory
    fn release(&self, handler: Box<dyn Handler<R>>) {
        drop(handler);
    }
}

/// Factory for asynchronous terminal handlers.
pub trait AsyncHandlerFactory<R: Request>: Send + Sync {
    /// Construct a fresh handler instance for one dispatch
    fn create(&self) -> Box<dyn AsyncHandler<R>>;

    /// Release a handler created by this factory
    fn release(&self, handler: Box<dyn AsyncHandler<R>>) {
        drop(handler);
    }
}

/// Factory for synchronous middleware.
pub trait MiddlewareFactory<R: Request>: Send + Sync {
    /// Construct a fresh middleware instance for one chain
    fn create(&self) -> Box<dyn Middleware<R>>;

    /// Release a middleware created by this factory
    fn release(&self, middleware: Box<dyn Middleware<R>>) {
        drop(middleware);
    }
}

/// Factory for asynchronous middleware.
pub trait AsyncMiddlewareFactory<R: Request>: Send + Sync {
    /// Construct a fresh middleware instance for one chain
    fn create(&self) -> Box<dyn AsyncMiddleware<R>>;

    /// Release a middleware created by this factory
    fn release(&self, middleware: Box<dyn AsyncMiddleware<R>>) {
        drop(middleware);
    }
}

/// Closure-backed synchronous handler factory.
///
/// # Example
/// ```rust,ignore
/// let factory = FnHandlerFactory::new(|| MyHandler::default());
/// ```
pub struct FnHandlerFactory<R: Request> {
    ctor: Arc<dyn Fn() -> Box<dyn Handler<R>> + Send + Sync>,
}

impl<R: Request> FnHandlerFactory<R> {
    /// Wrap a constructor closure
    pub fn new<H, F>(ctor: F) -> Self
    where
        H: Handler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        Self {
            ctor: Arc::new(move || Box::new(ctor())),
        }
    }
}

impl<R: Request> HandlerFactory<R> for FnHandlerFactory<R> {
    fn create(&self) -> Box<dyn Handler<R>> {
        (self.ctor)()
    }
}

/// Closure-backed asynchronous handler factory.
pub struct FnAsyncHandlerFactory<R: Request> {
    ctor: Arc<dyn Fn() -> Box<dyn AsyncHandler<R>> + Send + Sync>,
}

impl<R: Request> FnAsyncHandlerFactory<R> {
    /// Wrap a constructor closure
    pub fn new<H, F>(ctor: F) -> Self
    where
        H: AsyncHandler<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        Self {
            ctor: Arc::new(move || Box::new(ctor())),
        }
    }
}

impl<R: Request> AsyncHandlerFactory<R> for FnAsyncHandlerFactory<R> {
    fn create(&self) -> Box<dyn AsyncHandler<R>> {
        (self.ctor)()
    }
}

/// Closure-backed synchronous middleware factory.
pub struct FnMiddlewareFactory<R: Request> {
    ctor: Arc<dyn Fn() -> Box<dyn Middleware<R>> + Send + Sync>,
}

impl<R: Request> FnMiddlewareFactory<R> {
    /// Wrap a constructor closure
    pub fn new<M, F>(ctor: F) -> Self
    where
        M: Middleware<R> + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        Self {
            ctor: Arc::new(move || Box::new(ctor())),
        }
    }
}

impl<R: Request> MiddlewareFactory<R> for FnMiddlewareFactory<R> {
    fn create(&self) -> Box<dyn Middleware<R>> {
        (self.ctor)()
    }
}

/// Closure-backed asynchronous middleware factory.
pub struct FnAsyncMiddlewareFactory<R: Request> {
    ctor: Arc<dyn Fn() -> Box<dyn AsyncMiddleware<R>> + Send + Sync>,
}

impl<R: Request> FnAsyncMiddlewareFactory<R> {
    /// Wrap a constructor closure
    pub fn new<M, F>(ctor: F) -> Self
    where
        M: AsyncMiddleware<R> + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        Self {
            ctor: Arc::new(move || Box::new(ctor())),
        }
    }
}

impl<R: Request> AsyncMiddlewareFactory<R> for FnAsyncMiddlewareFactory<R> {
    fn create(&self) -> Box<dyn AsyncMiddleware<R>> {
        (self.ctor)()
    }
}
