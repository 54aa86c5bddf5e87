//! Retry policy: capped exponential backoff with configurable jitter.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Jitter distribution applied on top of the computed backoff delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// No jitter; the raw capped exponential delay.
    None,
    /// Uniform random addition in `[0, delay / 2)`. Spreads out retry
    /// storms from callers that failed at the same moment.
    #[default]
    Half,
}

/// Immutable retry parameters for a runner.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. `0` means one attempt total.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub backoff_base: Duration,
    /// Upper bound on the computed delay, jitter excluded.
    pub backoff_cap: Duration,
    /// Jitter distribution.
    pub jitter: Jitter,
}

impl RetryPolicy {
    /// Delay before retrying after a failure on `attempt` (0-based):
    /// `min(backoff_cap, backoff_base * 2^attempt)` plus jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(31));
        let delay = self.backoff_base.saturating_mul(factor).min(self.backoff_cap);
        match self.jitter {
            Jitter::None => delay,
            Jitter::Half => {
                let half_ns = delay.as_nanos() / 2;
                if half_ns == 0 {
                    return delay;
                }
                let bound = u64::try_from(half_ns).unwrap_or(u64::MAX);
                delay + Duration::from_nanos(rand::rng().random_range(0..bound))
            }
        }
    }
}

/// Per-invocation retry bookkeeping. Scoped to a single runner call and
/// discarded on success or once retries are exhausted.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Failures observed so far.
    pub attempt: u32,
    /// The most recent failure.
    pub last_error: Option<anyhow::Error>,
}

impl RetryState {
    /// Fresh state for a new invocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and advance the attempt counter.
    pub fn record(&mut self, error: anyhow::Error) {
        self.attempt += 1;
        self.last_error = Some(error);
    }

    /// Total attempts made so far, the initial one included.
    pub const fn attempts_made(&self) -> u32 {
        self.attempt
    }
}
