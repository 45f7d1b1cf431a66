//! Bounded retry with exponential backoff.

// Layer 1: Standard library imports
use std::thread;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Layer 3: Internal module imports
use super::traits::{AsyncPolicy, AsyncPolicyAction, Policy};
use crate::error::{BusError, BusResult};

/// Retry policy with exponential backoff.
///
/// Re-invokes the action up to `max_attempts` times, doubling the delay
/// after each failure up to `max_delay`:
///
/// ```text
/// delay = base_delay * 2^(attempt - 1)
/// delay = min(delay, max_delay)
/// ```
///
/// The exponent is capped at 10 to prevent overflow. The final failure
/// surfaces unchanged once attempts are exhausted.
///
/// # Examples
///
/// ```rust
/// use airssys_bus::policy::{Policy, RetryPolicy};
/// use std::time::Duration;
///
/// let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(50));
/// let mut attempts = 0;
/// let result = retry.execute(&mut || {
///     attempts += 1;
///     Ok(())
/// });
/// assert!(result.is_ok());
/// assert_eq!(attempts, 1);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of action invocations
    max_attempts: u32,

    /// Initial backoff delay (doubles each failure)
    base_delay: Duration,

    /// Maximum backoff delay (cap)
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a retry policy.
    ///
    /// `max_attempts` counts invocations, not re-invocations: a value of
    /// 1 behaves like the pass-through policy.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff delay after the given failed attempt (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        // Cap the exponent to prevent overflow
        let capped = attempt.saturating_sub(1).min(10);
        let multiplier = 2u64.pow(capped);
        let delay_ms = (self.base_delay.as_millis() as u64).saturating_mul(multiplier);

        Duration::from_millis(delay_ms).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    /// Default retry: 3 attempts, 50ms base delay, 5s cap.
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50), Duration::from_secs(5))
    }
}

impl Policy for RetryPolicy {
    fn execute(&self, action: &mut dyn FnMut() -> BusResult<()>) -> BusResult<()> {
        let mut attempt = 0u32;
        loop {
            match action() {
                Ok(()) => return Ok(()),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    let delay = self.delay_after(attempt);
                    debug!(attempt, ?delay, %error, "retrying after failure");
                    thread::sleep(delay);
                }
            }
        }
    }
}

#[async_trait]
impl AsyncPolicy for RetryPolicy {
    async fn execute(
        &self,
        action: AsyncPolicyAction<'_>,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(BusError::Cancelled);
            }
            match action().await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(error);
                    }
                    let delay = self.delay_after(attempt);
                    debug!(attempt, ?delay, %error, "retrying after failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
