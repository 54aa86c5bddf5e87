//! Engine configuration structures.

use serde::{Deserialize, Serialize};

use crate::core::retry::Jitter;

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

/// Retry and backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay in milliseconds before the first retry.
    pub backoff_base_ms: u64,
    /// Upper bound in milliseconds on the computed delay.
    pub backoff_cap_ms: u64,
    /// Jitter distribution applied on top of the delay.
    #[serde(default)]
    pub jitter: Jitter,
}

/// Root engine configuration. Constructor-time, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum cache entries.
    pub capacity: usize,
    /// Default ttl in milliseconds when `set` omits an explicit ttl.
    pub default_ttl_ms: u64,
    /// Maximum concurrently constructed pool resources.
    pub pool_size: usize,
    /// Maximum concurrent permits. Defaults to the CPU count.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Maximum queued callers before `Overloaded` rejection.
    /// `0` = unbounded queue, backpressure disabled.
    #[serde(default)]
    pub max_queue_length: usize,
    /// Retry policy.
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            default_ttl_ms: 30_000,
            pool_size: 8,
            max_concurrency: default_max_concurrency(),
            max_queue_length: 0,
            retry: RetryConfig {
                max_retries: 3,
                backoff_base_ms: 100,
                backoff_cap_ms: 5_000,
                jitter: Jitter::Half,
            },
        }
    }
}

impl RetryConfig {
    /// Validate retry configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_base_ms == 0 {
            return Err("backoff_base_ms must be greater than 0".into());
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err("backoff_cap_ms must not be less than backoff_base_ms".into());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Validate engine configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".into());
        }
        if self.default_ttl_ms == 0 {
            return Err("default_ttl_ms must be greater than 0".into());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be greater than 0".into());
        }
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".into());
        }
        self.retry
            .validate()
            .map_err(|e| format!("retry config invalid: {e}"))
    }

    /// Parse engine configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
