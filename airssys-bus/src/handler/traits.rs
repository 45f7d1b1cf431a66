// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::context::RequestContext;
use crate::error::BusResult;
use crate::request::Request;

/// Identifier naming a handler type in registrations and diagnostics.
///
/// Factories key their construction on it, and the pipeline builder uses
/// it to detect circular middleware declarations within one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerTypeId(&'static str);

impl HandlerTypeId {
    /// Create a handler type id from a static name
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for HandlerTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&'static str> for HandlerTypeId {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

/// Synchronous terminal handler for a request type.
///
/// Handlers are per-invocation instances created through a factory; they
/// are not assumed thread-safe, so each dispatch gets its own.
///
/// # Pass-Through Semantics
/// `handle` returns the request so middleware further along the chain
/// can observe any transformation the terminal applied.
pub trait Handler<R: Request>: Send {
    /// Returns the name of this handler for logging and identification.
    fn name(&self) -> &str;

    /// Handle the request.
    ///
    /// Any error propagates to the dispatching caller unchanged.
    fn handle(&mut self, request: R, context: &mut RequestContext) -> BusResult<R>;
}

/// Asynchronous terminal handler for a request type.
///
/// The cancellation token flows into every invocation; handlers observe
/// it at their own suspension points.
#[async_trait]
pub trait AsyncHandler<R: Request>: Send {
    /// Returns the name of this handler for logging and identification.
    fn name(&self) -> &str;

    /// Handle the request.
    async fn handle(
        &mut self,
        request: R,
        context: &mut RequestContext,
        cancel: &CancellationToken,
    ) -> BusResult<R>;
}
