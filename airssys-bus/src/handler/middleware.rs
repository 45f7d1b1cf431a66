//! Middleware abstractions for handler chains.
//!
//! Middleware intercepts a request before its terminal handler runs,
//! observes the outcome afterwards, and can steer the error path. Each
//! chain instantiates its own middleware through factories, so instances
//! may hold per-dispatch state.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::context::RequestContext;
use crate::error::BusError;
use crate::request::Request;

/// Result type for middleware hooks.
pub type MiddlewareResult<T> = Result<T, MiddlewareError>;

/// Error types specific to middleware processing.
#[derive(Debug, Clone, Error)]
pub enum MiddlewareError {
    /// The middleware refused the request
    #[error("request rejected: {reason}")]
    Rejected { reason: String },

    /// The middleware itself failed while processing
    #[error("processing failed: {reason}")]
    Failed { reason: String },
}

impl MiddlewareError {
    /// Creates a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a processing failure error.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Converts this middleware error to a bus error.
    pub fn into_bus_error(self, middleware: &str) -> BusError {
        BusError::middleware(middleware, self.to_string())
    }
}

/// Action to take when a chain encounters an error.
///
/// Returned by [`Middleware::on_error`]; lets a middleware wrap, replace,
/// or swallow failures flowing up the chain.
#[derive(Debug, Clone)]
pub enum ErrorAction {
    /// Continue unwinding with the original error
    Continue,

    /// Replace the original error with a different error
    Replace(BusError),

    /// Suppress the error and treat the chain as handled
    Suppress,
}

/// Where a middleware sits relative to the terminal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    /// `before` hook runs ahead of the terminal
    Before,

    /// `before` hook runs after the terminal completed
    After,
}

/// Outcome of one handler chain, observed by `after` hooks.
#[derive(Debug)]
pub enum ChainOutcome<R> {
    /// The terminal ran and returned the (possibly transformed) request
    Completed(R),

    /// A middleware short-circuited; the terminal never ran
    ShortCircuited,

    /// The chain failed with the final (possibly replaced) error
    Failed(BusError),
}

impl<R> ChainOutcome<R> {
    /// Returns true when the terminal handler ran to completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, ChainOutcome::Completed(_))
    }
}

/// Middleware hook surface for synchronous chains.
///
/// # Hook Order
/// `before` hooks run in declared order; the terminal runs next; `after`
/// hooks observe the outcome; `on_error` hooks run while an error
/// unwinds. Returning `Ok(None)` from `before` short-circuits the chain
/// (the middleware handled the request).
pub trait Middleware<R: Request>: Send {
    /// Returns the name of this middleware for logging and identification.
    fn name(&self) -> &str;

    /// Processes a request before the terminal handler runs.
    ///
    /// Returns `Ok(Some(request))` to continue with the (possibly
    /// modified) request, `Ok(None)` to short-circuit, or `Err` to
    /// reject.
    fn before(
        &mut self,
        request: R,
        _context: &mut RequestContext,
    ) -> MiddlewareResult<Option<R>> {
        Ok(Some(request))
    }

    /// Handles an error unwinding through the chain.
    fn on_error(&mut self, _error: &BusError, _context: &RequestContext) -> ErrorAction {
        ErrorAction::Continue
    }

    /// Observes the chain outcome after processing completes.
    fn after(
        &mut self,
        _context: &RequestContext,
        _outcome: &ChainOutcome<R>,
    ) -> MiddlewareResult<()> {
        Ok(())
    }
}

/// Middleware hook surface for asynchronous chains.
///
/// Mirrors [`Middleware`]; the cancellation token reaches every hook so
/// long-running interceptors can unwind cooperatively.
#[async_trait]
pub trait AsyncMiddleware<R: Request>: Send {
    /// Returns the name of this middleware for logging and identification.
    fn name(&self) -> &str;

    /// Processes a request before the terminal handler runs.
    async fn before(
        &mut self,
        request: R,
        _context: &mut RequestContext,
        _cancel: &CancellationToken,
    ) -> MiddlewareResult<Option<R>> {
        Ok(Some(request))
    }

    /// Handles an error unwinding through the chain.
    async fn on_error(&mut self, _error: &BusError, _context: &RequestContext) -> ErrorAction {
        ErrorAction::Continue
    }

    /// Observes the chain outcome after processing completes.
    async fn after(
        &mut self,
        _context: &RequestContext,
        _outcome: &ChainOutcome<R>,
    ) -> MiddlewareResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middleware_error_display() {
        let rejected = MiddlewareError::rejected("duplicate request");
        assert!(rejected.to_string().contains("rejected"));
        assert!(rejected.to_string().contains("duplicate request"));

        let failed = MiddlewareError::failed("store unavailable");
        assert!(failed.to_string().contains("store unavailable"));
    }

    #[test]
    fn test_into_bus_error_names_the_middleware() {
        let err = MiddlewareError::rejected("duplicate").into_bus_error("inbox");
        let msg = err.to_string();
        assert!(msg.contains("inbox"));
        assert!(msg.contains("duplicate"));
        assert_eq!(err.category(), "middleware");
    }

    #[test]
    fn test_chain_outcome_predicates() {
        assert!(ChainOutcome::Completed(1u8).is_completed());
        assert!(!ChainOutcome::<u8>::ShortCircuited.is_completed());
        assert!(!ChainOutcome::<u8>::Failed(BusError::Cancelled).is_completed());
    }

    #[test]
    fn test_placement_equality() {
        assert_eq!(Placement::Before, Placement::Before);
        assert_ne!(Placement::Before, Placement::After);
    }
}
