//! Handler chain execution.
//!
//! A chain wraps one terminal handler with its middleware. Every
//! instance the builder created is handed back to its factory exactly
//! once, in reverse construction order, when the chain drops; error
//! paths therefore cannot leak handlers.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

// Layer 3: Internal module imports
use crate::context::RequestContext;
use crate::error::{BusError, BusResult};
use crate::handler::{
    AsyncHandler, AsyncHandlerFactory, AsyncMiddleware, AsyncMiddlewareFactory, ChainOutcome,
    ErrorAction, Handler, HandlerFactory, HandlerTypeId, Middleware, MiddlewareFactory,
};
use crate::request::Request;

/// One middleware position in a synchronous chain.
///
/// Synthesized middleware (inbox, feature gates) carry no factory and
/// are released by drop.
pub(crate) struct MiddlewareSlot<R: Request> {
    name: HandlerTypeId,
    instance: Option<Box<dyn Middleware<R>>>,
    factory: Option<Arc<dyn MiddlewareFactory<R>>>,
}

impl<R: Request> MiddlewareSlot<R> {
    pub(crate) fn new(
        name: HandlerTypeId,
        instance: Box<dyn Middleware<R>>,
        factory: Option<Arc<dyn MiddlewareFactory<R>>>,
    ) -> Self {
        Self {
            name,
            instance: Some(instance),
            factory,
        }
    }

    fn release(&mut self) {
        if let Some(instance) = self.instance.take() {
            match &self.factory {
                Some(factory) => factory.release(instance),
                None => drop(instance),
            }
        }
    }
}

/// One middleware position in an asynchronous chain.
pub(crate) struct AsyncMiddlewareSlot<R: Request> {
    name: HandlerTypeId,
    instance: Option<Box<dyn AsyncMiddleware<R>>>,
    factory: Option<Arc<dyn AsyncMiddlewareFactory<R>>>,
}

impl<R: Request> AsyncMiddlewareSlot<R> {
    pub(crate) fn new(
        name: HandlerTypeId,
        instance: Box<dyn AsyncMiddleware<R>>,
        factory: Option<Arc<dyn AsyncMiddlewareFactory<R>>>,
    ) -> Self {
        Self {
            name,
            instance: Some(instance),
            factory,
        }
    }

    fn release(&mut self) {
        if let Some(instance) = self.instance.take() {
            match &self.factory {
                Some(factory) => factory.release(instance),
                None => drop(instance),
            }
        }
    }
}

/// Synchronous handler chain for one terminal handler.
///
/// Execution order: before-middleware in ascending step order, the
/// terminal, then after-middleware in ascending step order. A middleware
/// returning `Ok(None)` short-circuits; `on_error` hooks run while a
/// failure unwinds and may replace or suppress it; `after` hooks observe
/// the final outcome on every path.
pub struct HandlerChain<R: Request> {
    terminal_type: HandlerTypeId,
    before: Vec<MiddlewareSlot<R>>,
    after: Vec<MiddlewareSlot<R>>,
    terminal: Option<Box<dyn Handler<R>>>,
    terminal_factory: Arc<dyn HandlerFactory<R>>,
}

impl<R: Request> fmt::Debug for HandlerChain<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("terminal_type", &self.terminal_type)
            .field("before_len", &self.before.len())
            .field("after_len", &self.after.len())
            .finish()
    }
}

impl<R: Request> HandlerChain<R> {
    pub(crate) fn new(
        terminal_type: HandlerTypeId,
        before: Vec<MiddlewareSlot<R>>,
        terminal: Box<dyn Handler<R>>,
        terminal_factory: Arc<dyn HandlerFactory<R>>,
        after: Vec<MiddlewareSlot<R>>,
    ) -> Self {
        Self {
            terminal_type,
            before,
            after,
            terminal: Some(terminal),
            terminal_factory,
        }
    }

    /// The terminal handler's type id.
    pub fn terminal_type(&self) -> HandlerTypeId {
        self.terminal_type
    }

    /// Dispatch a request through this chain.
    ///
    /// Returns `Ok(Some(request))` when the terminal completed,
    /// `Ok(None)` when a middleware short-circuited or suppressed the
    /// failure, and the final error otherwise.
    pub fn dispatch(&mut self, request: R, context: &mut RequestContext) -> BusResult<Option<R>> {
        let mut outcome = self.run_pipeline(request, context);

        // Cancellation never enters the error hooks; it is an exit
        // condition, not a failure middleware may rewrite.
        outcome = match outcome {
            ChainOutcome::Failed(error) if !error.is_cancelled() => {
                self.unwind_error(error, context)
            }
            other => other,
        };

        let after_failure = self.run_after_hooks(context, &outcome);

        match outcome {
            ChainOutcome::Completed(result) => match after_failure {
                Some(error) => Err(error),
                None => Ok(Some(result)),
            },
            ChainOutcome::ShortCircuited => match after_failure {
                Some(error) => Err(error),
                None => Ok(None),
            },
            ChainOutcome::Failed(error) => Err(error),
        }
    }

    fn run_pipeline(&mut self, request: R, context: &mut RequestContext) -> ChainOutcome<R> {
        let mut current = request;

        for slot in &mut self.before {
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            match middleware.before(current, context) {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    trace!(middleware = %slot.name, "chain short-circuited");
                    return ChainOutcome::ShortCircuited;
                }
                Err(error) => {
                    return ChainOutcome::Failed(error.into_bus_error(slot.name.as_str()));
                }
            }
        }

        let Some(terminal) = self.terminal.as_mut() else {
            return ChainOutcome::Failed(BusError::configuration(
                "handler chain has already been released",
            ));
        };
        current = match terminal.handle(current, context) {
            Ok(result) => result,
            Err(error) => return ChainOutcome::Failed(error),
        };

        for slot in &mut self.after {
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            match middleware.before(current, context) {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    trace!(middleware = %slot.name, "chain short-circuited after terminal");
                    return ChainOutcome::ShortCircuited;
                }
                Err(error) => {
                    return ChainOutcome::Failed(error.into_bus_error(slot.name.as_str()));
                }
            }
        }

        ChainOutcome::Completed(current)
    }

    fn unwind_error(&mut self, error: BusError, context: &RequestContext) -> ChainOutcome<R> {
        let mut error = error;
        for slot in self
            .after
            .iter_mut()
            .rev()
            .chain(self.before.iter_mut().rev())
        {
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            match middleware.on_error(&error, context) {
                ErrorAction::Continue => {}
                ErrorAction::Replace(next) => error = next,
                ErrorAction::Suppress => {
                    trace!(middleware = %slot.name, "error suppressed");
                    return ChainOutcome::ShortCircuited;
                }
            }
        }
        ChainOutcome::Failed(error)
    }

    /// Runs every `after` hook. A hook failure on a successful chain
    /// becomes the chain failure; during an error unwind the original
    /// error wins and the hook failure is only logged.
    fn run_after_hooks(
        &mut self,
        context: &RequestContext,
        outcome: &ChainOutcome<R>,
    ) -> Option<BusError> {
        let failing = matches!(outcome, ChainOutcome::Failed(_));
        let mut first_failure = None;

        for slot in self.before.iter_mut().chain(self.after.iter_mut()) {
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            if let Err(error) = middleware.after(context, outcome) {
                if failing {
                    warn!(middleware = %slot.name, %error, "after hook failed during unwind");
                } else if first_failure.is_none() {
                    first_failure = Some(error.into_bus_error(slot.name.as_str()));
                }
            }
        }
        first_failure
    }

    fn release_all(&mut self) {
        // Reverse construction order: after slots, terminal, before slots
        for slot in self.after.iter_mut().rev() {
            slot.release();
        }
        if let Some(terminal) = self.terminal.take() {
            self.terminal_factory.release(terminal);
        }
        for slot in self.before.iter_mut().rev() {
            slot.release();
        }
    }
}

impl<R: Request> Drop for HandlerChain<R> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Asynchronous handler chain for one terminal handler.
///
/// Mirrors [`HandlerChain`] with cooperative cancellation: the token is
/// checked before every middleware and terminal invocation, and a
/// cancelled dispatch unwinds without entering the error hooks.
pub struct AsyncHandlerChain<R: Request> {
    terminal_type: HandlerTypeId,
    before: Vec<AsyncMiddlewareSlot<R>>,
    after: Vec<AsyncMiddlewareSlot<R>>,
    terminal: Option<Box<dyn AsyncHandler<R>>>,
    terminal_factory: Arc<dyn AsyncHandlerFactory<R>>,
}

impl<R: Request> AsyncHandlerChain<R> {
    pub(crate) fn new(
        terminal_type: HandlerTypeId,
        before: Vec<AsyncMiddlewareSlot<R>>,
        terminal: Box<dyn AsyncHandler<R>>,
        terminal_factory: Arc<dyn AsyncHandlerFactory<R>>,
        after: Vec<AsyncMiddlewareSlot<R>>,
    ) -> Self {
        Self {
            terminal_type,
            before,
            after,
            terminal: Some(terminal),
            terminal_factory,
        }
    }

    /// The terminal handler's type id.
    pub fn terminal_type(&self) -> HandlerTypeId {
        self.terminal_type
    }

    /// Dispatch a request through this chain.
    pub async fn dispatch(
        &mut self,
        request: R,
        context: &mut RequestContext,
        cancel: &CancellationToken,
    ) -> BusResult<Option<R>> {
        let mut outcome = self.run_pipeline(request, context, cancel).await;

        outcome = match outcome {
            ChainOutcome::Failed(error) if !error.is_cancelled() => {
                self.unwind_error(error, context).await
            }
            other => other,
        };

        let after_failure = self.run_after_hooks(context, &outcome).await;

        match outcome {
            ChainOutcome::Completed(result) => match after_failure {
                Some(error) => Err(error),
                None => Ok(Some(result)),
            },
            ChainOutcome::ShortCircuited => match after_failure {
                Some(error) => Err(error),
                None => Ok(None),
            },
            ChainOutcome::Failed(error) => Err(error),
        }
    }

    async fn run_pipeline(
        &mut self,
        request: R,
        context: &mut RequestContext,
        cancel: &CancellationToken,
    ) -> ChainOutcome<R> {
        let mut current = request;

        for slot in &mut self.before {
            if cancel.is_cancelled() {
                return ChainOutcome::Failed(BusError::Cancelled);
            }
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            match middleware.before(current, context, cancel).await {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    trace!(middleware = %slot.name, "chain short-circuited");
                    return ChainOutcome::ShortCircuited;
                }
                Err(error) => {
                    return ChainOutcome::Failed(error.into_bus_error(slot.name.as_str()));
                }
            }
        }

        if cancel.is_cancelled() {
            return ChainOutcome::Failed(BusError::Cancelled);
        }
        let Some(terminal) = self.terminal.as_mut() else {
            return ChainOutcome::Failed(BusError::configuration(
                "handler chain has already been released",
            ));
        };
        current = match terminal.handle(current, context, cancel).await {
            Ok(result) => result,
            Err(error) => return ChainOutcome::Failed(error),
        };

        for slot in &mut self.after {
            if cancel.is_cancelled() {
                return ChainOutcome::Failed(BusError::Cancelled);
            }
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            match middleware.before(current, context, cancel).await {
                Ok(Some(next)) => current = next,
                Ok(None) => {
                    trace!(middleware = %slot.name, "chain short-circuited after terminal");
                    return ChainOutcome::ShortCircuited;
                }
                Err(error) => {
                    return ChainOutcome::Failed(error.into_bus_error(slot.name.as_str()));
                }
            }
        }

        ChainOutcome::Completed(current)
    }

    async fn unwind_error(&mut self, error: BusError, context: &RequestContext) -> ChainOutcome<R> {
        let mut error = error;
        for slot in self
            .after
            .iter_mut()
            .rev()
            .chain(self.before.iter_mut().rev())
        {
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            match middleware.on_error(&error, context).await {
                ErrorAction::Continue => {}
                ErrorAction::Replace(next) => error = next,
                ErrorAction::Suppress => {
                    trace!(middleware = %slot.name, "error suppressed");
                    return ChainOutcome::ShortCircuited;
                }
            }
        }
        ChainOutcome::Failed(error)
    }

    async fn run_after_hooks(
        &mut self,
        context: &RequestContext,
        outcome: &ChainOutcome<R>,
    ) -> Option<BusError> {
        let failing = matches!(outcome, ChainOutcome::Failed(_));
        let mut first_failure = None;

        for slot in self.before.iter_mut().chain(self.after.iter_mut()) {
            let Some(middleware) = slot.instance.as_mut() else {
                continue;
            };
            if let Err(error) = middleware.after(context, outcome).await {
                if failing {
                    warn!(middleware = %slot.name, %error, "after hook failed during unwind");
                } else if first_failure.is_none() {
                    first_failure = Some(error.into_bus_error(slot.name.as_str()));
                }
            }
        }
        first_failure
    }

    fn release_all(&mut self) {
        for slot in self.after.iter_mut().rev() {
            slot.release();
        }
        if let Some(terminal) = self.terminal.take() {
            self.terminal_factory.release(terminal);
        }
        for slot in self.before.iter_mut().rev() {
            slot.release();
        }
    }
}

impl<R: Request> Drop for AsyncHandlerChain<R> {
    fn drop(&mut self) {
        self.release_all();
    }
}
