//! Retrying operation runner composing cache, limiter, and pool.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::cache::Cache;
use crate::core::error::{EngineError, OperationError};
use crate::core::limiter::ConcurrencyLimiter;
use crate::core::pool::{ResourceFactory, ResourcePool};
use crate::core::retry::{RetryPolicy, RetryState};
use crate::util::cancel::CancelToken;

/// A fallible unit of work executed by the runner.
///
/// When the runner's pool is in play, the operation receives a mutable
/// borrow of the checked-out resource; the runner releases the resource on
/// every exit path, so implementations never manage pool lifecycle.
#[async_trait]
pub trait Operation<R, V>: Send + Sync {
    /// Execute one attempt. Classify failures as
    /// [`OperationError::Transient`] (retried with backoff) or
    /// [`OperationError::Fatal`] (surfaced immediately).
    async fn execute(&self, resource: Option<&mut R>) -> Result<V, OperationError>;
}

/// Per-call options for [`Runner::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cache ttl for a successful result; `None` uses the cache default.
    pub ttl: Option<Duration>,
    /// Whether to check a pooled resource out for the operation. Ignored
    /// when the runner was built without a pool.
    pub use_pool: bool,
    /// Cooperative cancellation signal, checked at every suspension point.
    pub cancel: Option<CancelToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            use_pool: true,
            cancel: None,
        }
    }
}

/// Outcome of one admission + execution round.
enum AttemptError {
    /// Infrastructure failure (pool, cancellation); terminal as-is.
    Engine(EngineError),
    /// The operation itself failed.
    Operation(OperationError),
}

/// Composes a cache, a concurrency limiter, and an optional resource pool
/// into a retrying, cache-filling execution path.
///
/// Per invocation the runner walks `CheckCache -> Admit -> Execute`, then
/// terminates with success, schedules a retry, or fails. See
/// [`Runner::run`] for the exact transitions.
pub struct Runner<K, V, C, F>
where
    C: Cache<K, V>,
    F: ResourceFactory,
{
    cache: C,
    limiter: ConcurrencyLimiter,
    pool: Option<ResourcePool<F>>,
    policy: RetryPolicy,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, C, F> Runner<K, V, C, F>
where
    K: Send + Sync,
    V: Clone + Send + Sync,
    C: Cache<K, V>,
    F: ResourceFactory,
{
    /// Assemble a runner from explicitly constructed components.
    pub fn new(
        cache: C,
        limiter: ConcurrencyLimiter,
        pool: Option<ResourcePool<F>>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            cache,
            limiter,
            pool,
            policy,
            _marker: PhantomData,
        }
    }

    /// Produce a value for `key`.
    ///
    /// 1. **CheckCache** — a live cached entry returns immediately; no
    ///    permit or resource is consumed.
    /// 2. **Admit** — acquire a concurrency permit. [`EngineError::Overloaded`]
    ///    is terminal and never retried; cancellation while queued returns
    ///    [`EngineError::Cancelled`] without consuming a permit.
    /// 3. **Execute** — optionally check a resource out of the pool, invoke
    ///    the operation, and release the resource on every exit path.
    /// 4. Success stores the value in the cache with the call's ttl and
    ///    releases the permit.
    /// 5. A transient failure with attempts remaining releases the permit
    ///    *before* sleeping the backoff delay, then re-enters Admit.
    /// 6. A fatal failure, or exhausted retries, releases the permit and
    ///    returns the last error, wrapped as [`EngineError::RetryExhausted`]
    ///    when any retry was attempted.
    pub async fn run<O>(&self, key: K, operation: &O, opts: RunOptions) -> Result<V, EngineError>
    where
        O: Operation<F::Resource, V>,
    {
        if let Some(value) = self.cache.get(&key) {
            tracing::debug!("cache hit");
            return Ok(value);
        }

        let mut state = RetryState::new();
        loop {
            if let Some(token) = &opts.cancel {
                if token.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
            }
            let permit = self.limiter.acquire_cancellable(opts.cancel.as_ref()).await?;

            if let Some(token) = &opts.cancel {
                if token.is_cancelled() {
                    permit.release();
                    return Err(EngineError::Cancelled);
                }
            }

            let outcome = self.execute_once(operation, &opts).await;
            match outcome {
                Ok(value) => {
                    self.cache.set(key, value.clone(), opts.ttl);
                    permit.release();
                    tracing::debug!(attempts = state.attempts_made() + 1, "run succeeded");
                    return Ok(value);
                }
                Err(AttemptError::Engine(e)) => {
                    permit.release();
                    return Err(e);
                }
                Err(AttemptError::Operation(OperationError::Fatal(e))) => {
                    permit.release();
                    tracing::warn!(error = %e, "operation failed fatally");
                    return Err(if state.attempts_made() == 0 {
                        EngineError::OperationFailed(e)
                    } else {
                        EngineError::RetryExhausted {
                            attempts: state.attempts_made() + 1,
                            source: e,
                        }
                    });
                }
                Err(AttemptError::Operation(OperationError::Transient(e))) => {
                    // Never hold the permit across the backoff sleep.
                    permit.release();
                    if state.attempts_made() >= self.policy.max_retries {
                        tracing::warn!(
                            attempts = state.attempts_made() + 1,
                            error = %e,
                            "retries exhausted"
                        );
                        return Err(EngineError::RetryExhausted {
                            attempts: state.attempts_made() + 1,
                            source: e,
                        });
                    }
                    let delay = self.policy.next_delay(state.attempts_made());
                    state.record(e);
                    tracing::debug!(
                        attempt = state.attempts_made(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient failure, backing off"
                    );
                    self.backoff(delay, opts.cancel.as_ref()).await?;
                }
            }
        }
    }

    /// One Execute-state round: resource checkout, operation call, checkin.
    async fn execute_once<O>(&self, operation: &O, opts: &RunOptions) -> Result<V, AttemptError>
    where
        O: Operation<F::Resource, V>,
    {
        let Some(pool) = self.pool.as_ref().filter(|_| opts.use_pool) else {
            return operation
                .execute(None)
                .await
                .map_err(AttemptError::Operation);
        };

        let mut item = pool
            .acquire_cancellable(true, opts.cancel.as_ref())
            .await
            .map_err(AttemptError::Engine)?;
        let result = operation.execute(Some(&mut *item)).await;
        if let Err(e) = pool.release(item).await {
            // Cannot happen for an item we checked out ourselves.
            tracing::error!(error = %e, "pool refused release of runner-held item");
        }
        result.map_err(AttemptError::Operation)
    }

    /// Cancellable backoff sleep.
    async fn backoff(&self, delay: Duration, cancel: Option<&CancelToken>) -> Result<(), EngineError> {
        match cancel {
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Some(token) => tokio::select! {
                () = tokio::time::sleep(delay) => Ok(()),
                () = token.cancelled() => Err(EngineError::Cancelled),
            },
        }
    }

    /// The cache this runner consults and fills.
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    /// The admission gate guarding concurrent executions.
    pub const fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// The resource pool, when one was configured.
    pub const fn pool(&self) -> Option<&ResourcePool<F>> {
        self.pool.as_ref()
    }

    /// Explicit shutdown: drain the pool (if any) so every resource is
    /// returned and disposed. The cache needs no teardown.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.drain().await;
        }
    }
}

impl<K, V, C, F> std::fmt::Debug for Runner<K, V, C, F>
where
    C: Cache<K, V>,
    F: ResourceFactory,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("limiter", &self.limiter)
            .field("pooled", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}
