//! Error types for engine operations.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by engine components.
///
/// Nothing is recovered silently except routine cache misses and LRU
/// eviction; every other failure propagates to the immediate caller with a
/// specific kind. Logging on failure is the caller's responsibility.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A non-blocking acquire found no idle or constructible resource.
    /// Recoverable by caller retry or backoff.
    #[error("pool exhausted: no idle or constructible resource")]
    PoolExhausted,
    /// `release` was called with an item that is not checked out.
    /// Programming error; never silently corrupts pool bookkeeping.
    #[error("invalid release: item {0} is not checked out")]
    InvalidRelease(Uuid),
    /// The pool is draining; no new resources are handed out.
    #[error("pool is draining")]
    Draining,
    /// The concurrency wait queue is full. Signals the caller to shed load;
    /// never retried internally.
    #[error("overloaded: concurrency wait queue is full")]
    Overloaded,
    /// The operation kept failing after the configured number of retries.
    /// Wraps the last underlying error.
    #[error("retries exhausted after {attempts} attempts")]
    RetryExhausted {
        /// Total attempts made, including the initial one.
        attempts: u32,
        /// The last underlying operation error.
        #[source]
        source: anyhow::Error,
    },
    /// The operation failed fatally on its first attempt.
    #[error("operation failed")]
    OperationFailed(#[source] anyhow::Error),
    /// The resource construction hook failed. The pool slot is returned to
    /// constructible state.
    #[error("resource construction failed")]
    Factory(#[source] anyhow::Error),
    /// The caller's cancellation signal fired while suspended.
    #[error("cancelled")]
    Cancelled,
    /// Configuration validation failed at build time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A single operation failure, classified for retry handling.
#[derive(Debug)]
pub enum OperationError {
    /// Transient failure; eligible for retry with backoff.
    Transient(anyhow::Error),
    /// Fatal failure; surfaced to the caller without further attempts.
    Fatal(anyhow::Error),
}

impl OperationError {
    /// Shorthand for a transient failure from a message.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(anyhow::anyhow!(msg.into()))
    }

    /// Shorthand for a fatal failure from a message.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(anyhow::anyhow!(msg.into()))
    }

    /// Unwrap the underlying error regardless of classification.
    pub fn into_source(self) -> anyhow::Error {
        match self {
            Self::Transient(e) | Self::Fatal(e) => e,
        }
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(e) => write!(f, "transient operation error: {e}"),
            Self::Fatal(e) => write!(f, "fatal operation error: {e}"),
        }
    }
}

impl std::error::Error for OperationError {}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
