//! Subscriber registry: request type to ordered handler registrations.
//!
//! The registry is a pure lookup table. Registration order is preserved;
//! duplicate registrations are legal because only `send` enforces the
//! single-handler contract, and it does so at dispatch time.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::handler::{
    AsyncHandlerFactory, AsyncMiddlewareFactory, HandlerFactory, HandlerTypeId,
    MiddlewareFactory, Placement,
};
use crate::request::Request;

/// Declares one middleware of a handler chain.
///
/// Replaces the attribute-driven declarations of classic dispatchers with
/// an explicit table entry: placement (before or after the terminal), an
/// integer step ordering middleware within a placement, and the factory
/// that constructs the middleware per chain.
#[derive(Clone)]
pub struct MiddlewareRegistration<R: Request> {
    handler_type: HandlerTypeId,
    placement: Placement,
    step: i32,
    sync_factory: Option<Arc<dyn MiddlewareFactory<R>>>,
    async_factory: Option<Arc<dyn AsyncMiddlewareFactory<R>>>,
}

impl<R: Request> MiddlewareRegistration<R> {
    /// Declare a synchronous middleware
    pub fn sync(
        handler_type: impl Into<HandlerTypeId>,
        placement: Placement,
        step: i32,
        factory: impl MiddlewareFactory<R> + 'static,
    ) -> Self {
        Self {
            handler_type: handler_type.into(),
            placement,
            step,
            sync_factory: Some(Arc::new(factory)),
            async_factory: None,
        }
    }

    /// Declare an asynchronous middleware
    pub fn asynchronous(
        handler_type: impl Into<HandlerTypeId>,
        placement: Placement,
        step: i32,
        factory: impl AsyncMiddlewareFactory<R> + 'static,
    ) -> Self {
        Self {
            handler_type: handler_type.into(),
            placement,
            step,
            sync_factory: None,
            async_factory: Some(Arc::new(factory)),
        }
    }

    /// Builder method: add the async factory to a sync declaration
    pub fn with_async_factory(mut self, factory: impl AsyncMiddlewareFactory<R> + 'static) -> Self {
        self.async_factory = Some(Arc::new(factory));
        self
    }

    /// The middleware's handler type id
    pub fn handler_type(&self) -> HandlerTypeId {
        self.handler_type
    }

    /// Where the middleware sits relative to the terminal
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Ordering priority within the placement
    pub fn step(&self) -> i32 {
        self.step
    }

    /// The sync factory, when declared
    pub fn sync_factory(&self) -> Option<&Arc<dyn MiddlewareFactory<R>>> {
        self.sync_factory.as_ref()
    }

    /// The async factory, when declared
    pub fn async_factory(&self) -> Option<&Arc<dyn AsyncMiddlewareFactory<R>>> {
        self.async_factory.as_ref()
    }
}

/// Declares one terminal handler for a request type.
///
/// A registration may carry a sync factory, an async factory, or both;
/// dispatch fails with a configuration error when the invoked variant
/// has no matching factory.
#[derive(Clone)]
pub struct HandlerRegistration<R: Request> {
    handler_type: HandlerTypeId,
    sync_factory: Option<Arc<dyn HandlerFactory<R>>>,
    async_factory: Option<Arc<dyn AsyncHandlerFactory<R>>>,
    middleware: Vec<MiddlewareRegistration<R>>,
    use_inbox: bool,
}

impl<R: Request> HandlerRegistration<R> {
    /// Register a synchronous terminal handler
    pub fn sync(
        handler_type: impl Into<HandlerTypeId>,
        factory: impl HandlerFactory<R> + 'static,
    ) -> Self {
        Self {
            handler_type: handler_type.into(),
            sync_factory: Some(Arc::new(factory)),
            async_factory: None,
            middleware: Vec::new(),
            use_inbox: true,
        }
    }

    /// Register an asynchronous terminal handler
    pub fn asynchronous(
        handler_type: impl Into<HandlerTypeId>,
        factory: impl AsyncHandlerFactory<R> + 'static,
    ) -> Self {
        Self {
            handler_type: handler_type.into(),
            sync_factory: None,
            async_factory: Some(Arc::new(factory)),
            middleware: Vec::new(),
            use_inbox: true,
        }
    }

    /// Builder method: add the async factory to a sync registration
    pub fn with_async_factory(mut self, factory: impl AsyncHandlerFactory<R> + 'static) -> Self {
        self.async_factory = Some(Arc::new(factory));
        self
    }

    /// Builder method: declare a middleware for this handler's chain
    pub fn with_middleware(mut self, middleware: MiddlewareRegistration<R>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Builder method: opt this handler out of inbox deduplication
    pub fn without_inbox(mut self) -> Self {
        self.use_inbox = false;
        self
    }

    /// The terminal's handler type id
    pub fn handler_type(&self) -> HandlerTypeId {
        self.handler_type
    }

    /// The sync factory, when declared
    pub fn sync_factory(&self) -> Option<&Arc<dyn HandlerFactory<R>>> {
        self.sync_factory.as_ref()
    }

    /// The async factory, when declared
    pub fn async_factory(&self) -> Option<&Arc<dyn AsyncHandlerFactory<R>>> {
        self.async_factory.as_ref()
    }

    /// Declared middleware, in declaration order
    pub fn middleware(&self) -> &[MiddlewareRegistration<R>] {
        &self.middleware
    }

    /// Whether the inbox middleware applies to this handler's chain
    pub fn use_inbox(&self) -> bool {
        self.use_inbox
    }
}

/// Maps a request type to its ordered handler registrations.
///
/// The in-memory table is keyed by `TypeId`, so lookups are collision
/// free without runtime reflection; `Request::REQUEST_TYPE` stays the
/// diagnostic and wire-level name.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Append a handler registration for `R`, preserving order.
    pub fn register<R: Request>(&self, registration: HandlerRegistration<R>) {
        let mut entry = self
            .entries
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Vec::<HandlerRegistration<R>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<HandlerRegistration<R>>>() {
            list.push(registration);
        }
    }

    /// The registrations for `R`, in registration order.
    pub fn registrations_for<R: Request>(&self) -> Vec<HandlerRegistration<R>> {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|entry| {
                entry
                    .downcast_ref::<Vec<HandlerRegistration<R>>>()
                    .map(|list| list.to_vec())
            })
            .unwrap_or_default()
    }

    /// Number of handlers registered for `R`.
    pub fn handler_count<R: Request>(&self) -> usize {
        self.entries
            .get(&TypeId::of::<R>())
            .and_then(|entry| {
                entry
                    .downcast_ref::<Vec<HandlerRegistration<R>>>()
                    .map(Vec::len)
            })
            .unwrap_or(0)
    }
}
