//! Reserved policy registry names.
//!
//! The external bus resolves its resilience envelope through these names;
//! callers override the defaults by registering their own policies under
//! the same keys.

/// Circuit breaker wrapping every synchronous produce
pub const CIRCUIT_BREAKER: &str = "CircuitBreaker";

/// Retry nested inside the synchronous circuit breaker
pub const RETRY_POLICY: &str = "RetryPolicy";

/// Circuit breaker wrapping every asynchronous produce
pub const CIRCUIT_BREAKER_ASYNC: &str = "CircuitBreaker.Async";

/// Retry nested inside the asynchronous circuit breaker
pub const RETRY_POLICY_ASYNC: &str = "RetryPolicy.Async";
