//! Cooperative cancellation signal for suspended callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// A cloneable cancellation signal.
///
/// Callers hand a token to the engine's suspending operations (limiter
/// acquire, blocking pool acquire, retry backoff sleep) and fire it from
/// anywhere. Cancellation is level-triggered: once fired, every current and
/// future wait observes it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    fired: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Create a fresh, unfired token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal, waking every task currently waiting on it.
    pub fn cancel(&self) {
        self.inner.fired.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    /// Whether the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Suspend until the signal fires. Returns immediately if it already has.
    pub async fn cancelled(&self) {
        // Register interest before re-checking the flag so a concurrent
        // cancel() between the check and the await cannot be missed.
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
