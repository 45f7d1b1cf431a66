//! Error types and result alias for the bus runtime.
//!
//! One structured error enum covers every failure kind the façade can
//! surface, with contextual helper constructors and categorization
//! predicates for logging and metrics.

// Layer 1: Standard library imports
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::MessageId;

/// Result type alias for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Comprehensive error types for dispatch and external-bus operations.
///
/// The variants are failure *kinds*, not collaborator types: a missing
/// mapper and a missing outbox both surface as [`BusError::Configuration`],
/// while a handler-raised error travels unchanged inside
/// [`BusError::User`].
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// A required collaborator was not configured
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// The caller violated an invariant (handler count, zero timeout)
    #[error("Contract violation: {reason}")]
    Contract { reason: String },

    /// An outbox id had no corresponding entry
    #[error("Message not found in outbox: {id}")]
    NotFound { id: MessageId },

    /// Cooperative cancellation was observed before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// Publish fan-out collected one or more handler failures
    #[error("Publish failed: {} handler error(s)", .errors.len())]
    Aggregate { errors: Vec<BusError> },

    /// A blocking receive exhausted its budget
    #[error("Timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// A middleware rejected the request or failed while processing it
    #[error("Middleware '{middleware}' failed: {reason}")]
    Middleware { middleware: String, reason: String },

    /// Producer, outbox, or channel I/O failed
    #[error("Transport failure during {operation}: {reason}")]
    Transport { operation: String, reason: String },

    /// A handler-raised error, propagated unchanged
    #[error("Handler error: {0}")]
    User(Arc<dyn StdError + Send + Sync + 'static>),
}

/// Plain-string handler failure for callers without a richer error type.
#[derive(Debug)]
struct HandlerFailure(String);

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for HandlerFailure {}

impl BusError {
    /// Creates a new configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates a new contract violation error.
    pub fn contract(reason: impl Into<String>) -> Self {
        Self::Contract {
            reason: reason.into(),
        }
    }

    /// Creates a new middleware failure error.
    pub fn middleware(middleware: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Middleware {
            middleware: middleware.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new transport failure error.
    pub fn transport(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a handler-raised error.
    pub fn user(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::User(Arc::new(source))
    }

    /// Wraps a plain-string handler failure.
    pub fn user_message(reason: impl Into<String>) -> Self {
        Self::User(Arc::new(HandlerFailure(reason.into())))
    }

    /// Returns true if this error represents a configuration failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, BusError::Configuration { .. })
    }

    /// Returns true if this error represents a caller contract violation.
    pub fn is_contract(&self) -> bool {
        matches!(self, BusError::Contract { .. })
    }

    /// Returns true if this error represents a missing outbox entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BusError::NotFound { .. })
    }

    /// Returns true if this error represents cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BusError::Cancelled)
    }

    /// Returns true if this error carries aggregated publish failures.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, BusError::Aggregate { .. })
    }

    /// Returns true if this error should be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BusError::Transport { .. } | BusError::Timeout { .. }
        )
    }

    /// Returns the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            BusError::Configuration { .. } => "configuration",
            BusError::Contract { .. } => "contract",
            BusError::NotFound { .. } => "not-found",
            BusError::Cancelled => "cancellation",
            BusError::Aggregate { .. } => "aggregate",
            BusError::Timeout { .. } => "timeout",
            BusError::Middleware { .. } => "middleware",
            BusError::Transport { .. } => "transport",
            BusError::User(_) => "user",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let cfg_err = BusError::configuration("no outbox configured");
        assert!(cfg_err.is_configuration());
        assert_eq!(cfg_err.category(), "configuration");

        let contract_err = BusError::contract("expected exactly one handler");
        assert!(contract_err.is_contract());
        assert_eq!(contract_err.category(), "contract");

        let mw_err = BusError::middleware("inbox", "duplicate request");
        assert_eq!(mw_err.category(), "middleware");
    }

    #[test]
    fn test_error_categorization() {
        let transport_err = BusError::transport("produce", "connection refused");
        assert!(transport_err.is_retryable());
        assert_eq!(transport_err.category(), "transport");

        let user_err = BusError::user_message("boom");
        assert!(!user_err.is_retryable());
        assert_eq!(user_err.category(), "user");
    }

    #[test]
    fn test_error_display() {
        let cfg_err = BusError::configuration("no mapper for MyCommand");
        let msg = format!("{cfg_err}");
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("MyCommand"));

        let user_err = BusError::user_message("boom");
        assert!(format!("{user_err}").contains("boom"));
    }

    #[test]
    fn test_not_found_display() {
        let id = MessageId::new();
        let err = BusError::NotFound { id };
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_aggregate_counts_inner_errors() {
        let err = BusError::Aggregate {
            errors: vec![
                BusError::user_message("first"),
                BusError::user_message("second"),
            ],
        };
        assert!(err.is_aggregate());
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_cancelled_category() {
        let err = BusError::Cancelled;
        assert!(err.is_cancelled());
        assert_eq!(err.category(), "cancellation");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BusError>();
    }

    #[test]
    fn test_error_clone_keeps_user_source() {
        let err = BusError::user_message("boom");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
