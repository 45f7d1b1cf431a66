//! Circuit breaker with closed/open/half-open states.

// Layer 1: Standard library imports
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Layer 3: Internal module imports
use super::traits::{AsyncPolicy, AsyncPolicyAction, Policy};
use crate::error::{BusError, BusResult};

/// Breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    /// Normal operation, counting consecutive failures
    Closed { failures: u32 },
    /// Failing fast until the cooldown elapses
    Open { opened_at: Instant },
    /// Exactly one probe is in flight; its outcome decides the next
    /// state, and every other caller fails fast until then
    HalfOpen,
}

/// Circuit breaker policy.
///
/// Counts consecutive failures while closed; reaching the threshold
/// opens the circuit, and while open every execution fails fast with a
/// transport error. After the cooldown the first execution to arrive is
/// admitted as the single half-open probe: success closes the circuit,
/// failure re-opens it, and concurrent executions arriving while the
/// probe is in flight fail fast rather than piling onto a broker that
/// may still be down.
///
/// The state is shared across clones of the wrapping `Arc`, so sync and
/// async executions observe one circuit.
///
/// # Examples
///
/// ```rust
/// use airssys_bus::policy::{CircuitBreaker, Policy};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
///
/// // Two consecutive failures open the circuit
/// for _ in 0..2 {
///     let _ = breaker.execute(&mut || {
///         Err(airssys_bus::error::BusError::transport("send", "down"))
///     });
/// }
/// assert!(breaker.is_open());
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Consecutive failures that open the circuit
    failure_threshold: u32,

    /// Time the circuit stays open before a half-open probe
    cooldown: Duration,

    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a circuit breaker.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    /// Returns true while the circuit is failing fast.
    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), BreakerState::Open { .. })
    }

    /// Admission check; the lock is released before the action runs.
    ///
    /// Once the cooldown elapses the open circuit admits exactly one
    /// caller as the half-open probe. Half-open therefore rejects:
    /// the probe that put the breaker there is still in flight.
    fn admit(&self) -> BusResult<()> {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed { .. } => Ok(()),
            BreakerState::HalfOpen => Err(BusError::transport(
                "circuit-breaker",
                "circuit is half-open, probe in flight",
            )),
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.cooldown {
                    debug!("circuit breaker half-open, admitting single probe");
                    *state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(BusError::transport("circuit-breaker", "circuit is open"))
                }
            }
        }
    }

    fn record_success(&self) {
        *self.state.lock() = BreakerState::Closed { failures: 0 };
    }

    fn record_failure(&self) {
        let mut state = self.state.lock();
        *state = match *state {
            BreakerState::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.failure_threshold {
                    debug!(failures, "circuit breaker opened");
                    BreakerState::Open {
                        opened_at: Instant::now(),
                    }
                } else {
                    BreakerState::Closed { failures }
                }
            }
            BreakerState::HalfOpen => {
                debug!("circuit breaker probe failed, re-opening");
                BreakerState::Open {
                    opened_at: Instant::now(),
                }
            }
            open => open,
        };
    }
}

impl Default for CircuitBreaker {
    /// Default breaker: 5 consecutive failures, 30 second cooldown.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

impl Policy for CircuitBreaker {
    fn execute(&self, action: &mut dyn FnMut() -> BusResult<()>) -> BusResult<()> {
        self.admit()?;
        match action() {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }
}

#[async_trait]
impl AsyncPolicy for CircuitBreaker {
    async fn execute(
        &self,
        action: AsyncPolicyAction<'_>,
        cancel: &CancellationToken,
    ) -> BusResult<()> {
        if cancel.is_cancelled() {
            return Err(BusError::Cancelled);
        }
        self.admit()?;
        match action().await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(error) => {
                self.record_failure();
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn failing() -> BusResult<()> {
        Err(BusError::transport("send", "down"))
    }

    #[test]
    fn test_closed_passes_through() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        let result = Policy::execute(&breaker, &mut || Ok(()));

        assert!(result.is_ok());
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));

        assert!(Policy::execute(&breaker, &mut failing).is_err());
        assert!(!breaker.is_open());
        assert!(Policy::execute(&breaker, &mut failing).is_err());
        assert!(breaker.is_open());
    }

    #[test]
    fn test_open_circuit_fails_fast() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let _ = Policy::execute(&breaker, &mut failing);

        let mut calls = 0;
        let err = Policy::execute(&breaker, &mut || {
            calls += 1;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(calls, 0); // action never ran
        assert!(err.to_string().contains("circuit is open"));
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));

        let _ = Policy::execute(&breaker, &mut failing);
        assert!(Policy::execute(&breaker, &mut || Ok(())).is_ok());
        let _ = Policy::execute(&breaker, &mut failing);

        // Count restarted after the success, so one failure is not enough
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_half_open_probe_closes_circuit() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        let _ = Policy::execute(&breaker, &mut failing);
        assert!(breaker.is_open());

        std::thread::sleep(Duration::from_millis(10));

        // Probe succeeds, circuit closes
        assert!(Policy::execute(&breaker, &mut || Ok(())).is_ok());
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        let _ = Policy::execute(&breaker, &mut failing);

        std::thread::sleep(Duration::from_millis(10));

        assert!(Policy::execute(&breaker, &mut failing).is_err());
        assert!(breaker.is_open());
    }

    #[test]
    fn test_half_open_admits_exactly_one_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(5));
        let _ = Policy::execute(&breaker, &mut failing);

        std::thread::sleep(Duration::from_millis(10));

        // The outer execution is the probe; a second execution arriving
        // while it is in flight must fail fast
        let err = Policy::execute(&breaker, &mut || {
            Policy::execute(&breaker, &mut || Ok(()))
        })
        .unwrap_err();

        assert!(err.to_string().contains("probe in flight"));
        // The rejected inner attempt failed the probe, re-opening
        assert!(breaker.is_open());

        // Once the probe window comes back, a clean probe closes it
        std::thread::sleep(Duration::from_millis(10));
        assert!(Policy::execute(&breaker, &mut || Ok(())).is_ok());
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn test_async_execution_shares_state() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let result = AsyncPolicy::execute(
            &breaker,
            Box::new(|| Box::pin(async { failing() })),
            &cancel,
        )
        .await;

        assert!(result.is_err());
        assert!(breaker.is_open());

        // Sync path observes the same open circuit
        let err = Policy::execute(&breaker, &mut || Ok(())).unwrap_err();
        assert!(err.to_string().contains("circuit is open"));
    }
}
