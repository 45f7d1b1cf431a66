// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::error::BusResult;

/// Re-invocable action for asynchronous policies.
///
/// Policies may run the action several times (retry) or not at all (open
/// circuit), so the action is a factory of futures rather than a single
/// future.
pub type AsyncPolicyAction<'a> = Box<dyn Fn() -> BoxFuture<'a, BusResult<()>> + Send + Sync + 'a>;

/// Synchronous resilience policy.
///
/// A policy decorates an action with failure-handling behavior. Policies
/// compose by nesting `execute` calls; the core nests retry inside the
/// circuit breaker:
///
/// ```rust,ignore
/// breaker.execute(&mut || retry.execute(&mut || producer.send(&message)))
/// ```
pub trait Policy: Send + Sync {
    /// Run the action under this policy.
    ///
    /// The action may be invoked zero or more times. The final failure
    /// surfaces unchanged once the policy gives up.
    fn execute(&self, action: &mut dyn FnMut() -> BusResult<()>) -> BusResult<()>;
}

/// Asynchronous resilience policy.
///
/// Mirrors [`Policy`] for the async half of the façade. The cancellation
/// token is observed between invocations; policies never use it for
/// anything other than cooperative shutdown.
#[async_trait]
pub trait AsyncPolicy: Send + Sync {
    /// Run the action under this policy.
    async fn execute(
        &self,
        action: AsyncPolicyAction<'_>,
        cancel: &CancellationToken,
    ) -> BusResult<()>;
}

/// Pass-through policy.
///
/// Runs the action exactly once with no failure handling. The default
/// policy registry installs this under every reserved name so the bus
/// works before any real policies are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPolicy;

impl Policy for NoopPolicy {
    fn execute(&self, action: &mut dyn FnMut() -> BusResult<()>) -> BusResult<()> {
        action()
    }
}

#[async_trait]
impl AsyncPolicy for NoopPolicy {
    async fn execute(
        &self,
        action: AsyncPolicyAction<'_>,
        _cancel: &CancellationToken,
    ) -> BusResult<()> {
        action().await
    }
}
