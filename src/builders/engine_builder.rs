//! Construct an engine stack from validated configuration.

use std::hash::Hash;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::core::cache::BoundedCache;
use crate::core::error::EngineError;
use crate::core::limiter::ConcurrencyLimiter;
use crate::core::pool::{ResourceFactory, ResourcePool};
use crate::core::retry::RetryPolicy;
use crate::core::runner::Runner;

/// Convert the millisecond config fields into a [`RetryPolicy`].
fn retry_policy(cfg: &EngineConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: cfg.retry.max_retries,
        backoff_base: Duration::from_millis(cfg.retry.backoff_base_ms),
        backoff_cap: Duration::from_millis(cfg.retry.backoff_cap_ms),
        jitter: cfg.retry.jitter,
    }
}

/// Build a complete runner stack — bounded cache, concurrency limiter, and
/// (when a factory is supplied) resource pool — from configuration.
///
/// Configuration is validated first; invalid values fail with
/// [`EngineError::InvalidConfig`] before anything is constructed. With
/// `factory = None` the runner executes operations without a pooled
/// resource; use [`crate::core::NoopFactory`] as the type parameter.
pub fn build_engine<K, V, F>(
    cfg: &EngineConfig,
    factory: Option<F>,
) -> Result<Runner<K, V, BoundedCache<K, V>, F>, EngineError>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: ResourceFactory,
{
    cfg.validate().map_err(EngineError::InvalidConfig)?;

    let cache = BoundedCache::new(cfg.capacity, Duration::from_millis(cfg.default_ttl_ms));
    let limiter = ConcurrencyLimiter::new(cfg.max_concurrency, cfg.max_queue_length);
    let pool = factory.map(|f| ResourcePool::new(cfg.pool_size, f));
    Ok(Runner::new(cache, limiter, pool, retry_policy(cfg)))
}
