//! Core engine components: cache, pool, limiter, runner, and errors.

pub mod error;
pub mod cache;
pub mod pool;
pub mod limiter;
pub mod retry;
pub mod runner;

pub use error::{AppResult, EngineError, OperationError};
pub use cache::{BoundedCache, Cache, NoopCache};
pub use pool::{NoopFactory, PoolStats, PooledItem, ResourceFactory, ResourcePool};
pub use limiter::{ConcurrencyLimiter, Permit};
pub use retry::{Jitter, RetryPolicy, RetryState};
pub use runner::{Operation, RunOptions, Runner};
