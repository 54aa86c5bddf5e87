//! FIFO counting admission gate with optional bounded-queue backpressure.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::core::error::EngineError;
use crate::util::cancel::CancelToken;

/// A caller queued for a permit.
struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

struct LimiterState {
    /// Permits currently held by callers.
    outstanding: usize,
    queue: VecDeque<Waiter>,
    next_waiter_id: u64,
}

struct Shared {
    max_permits: usize,
    /// 0 disables the bound (backpressure off).
    max_queue_length: usize,
    state: Mutex<LimiterState>,
}

impl Shared {
    /// Return one permit. The head waiter, if any, is granted under the same
    /// critical section, so no later caller can slip in between.
    fn release_one(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.queue.pop_front() {
            if waiter.tx.send(()).is_ok() {
                // Permit transferred to the waiter; outstanding unchanged.
                tracing::debug!(waiter = waiter.id, "permit handed to queued caller");
                return;
            }
            // Waiter gave up (cancelled or dropped); try the next one.
        }
        state.outstanding = state.outstanding.saturating_sub(1);
    }
}

/// Bounds how many operations may run simultaneously, queueing excess
/// callers in strict FIFO order.
///
/// Fairness invariant: permits are granted strictly in request order. An
/// arriving caller is never served while an earlier caller is still queued,
/// regardless of retry count or priority. A release grants the head of the
/// queue atomically, inside the releasing critical section.
///
/// With a non-zero `max_queue_length`, `acquire` fails fast with
/// [`EngineError::Overloaded`] once the wait queue is full. This is the
/// engine's backpressure mechanism under sustained overload.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    shared: Arc<Shared>,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `max_permits` concurrent slots and an optional
    /// queue bound (`0` = unbounded queue, backpressure disabled).
    pub fn new(max_permits: usize, max_queue_length: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                max_permits,
                max_queue_length,
                state: Mutex::new(LimiterState {
                    outstanding: 0,
                    queue: VecDeque::new(),
                    next_waiter_id: 0,
                }),
            }),
        }
    }

    /// Acquire a permit, suspending in FIFO order when none is free.
    pub async fn acquire(&self) -> Result<Permit, EngineError> {
        self.acquire_inner(None).await
    }

    /// Acquire a permit with a cancellation signal. A fired token while
    /// queued removes the waiter and returns [`EngineError::Cancelled`]
    /// without consuming a permit.
    pub async fn acquire_cancellable(
        &self,
        cancel: Option<&CancelToken>,
    ) -> Result<Permit, EngineError> {
        self.acquire_inner(cancel).await
    }

    async fn acquire_inner(&self, cancel: Option<&CancelToken>) -> Result<Permit, EngineError> {
        let (waiter_id, mut rx) = {
            let mut state = self.shared.state.lock();
            // Immediate grant only when no one is queued ahead of us.
            if state.outstanding < self.shared.max_permits && state.queue.is_empty() {
                state.outstanding += 1;
                return Ok(Permit::new(Arc::clone(&self.shared)));
            }
            if self.shared.max_queue_length > 0
                && state.queue.len() >= self.shared.max_queue_length
            {
                tracing::warn!(
                    depth = state.queue.len(),
                    "acquire rejected: wait queue full"
                );
                return Err(EngineError::Overloaded);
            }
            let (tx, rx) = oneshot::channel();
            let id = state.next_waiter_id;
            state.next_waiter_id += 1;
            state.queue.push_back(Waiter { id, tx });
            tracing::debug!(waiter = id, depth = state.queue.len(), "caller queued for permit");
            (id, rx)
        };

        let Some(token) = cancel else {
            return match rx.await {
                Ok(()) => Ok(Permit::new(Arc::clone(&self.shared))),
                // Sender dropped without a grant; treated as cancellation.
                Err(_) => Err(EngineError::Cancelled),
            };
        };

        tokio::select! {
            biased;
            granted = &mut rx => match granted {
                Ok(()) => Ok(Permit::new(Arc::clone(&self.shared))),
                Err(_) => Err(EngineError::Cancelled),
            },
            () = token.cancelled() => {
                let removed = {
                    let mut state = self.shared.state.lock();
                    let pos = state.queue.iter().position(|w| w.id == waiter_id);
                    pos.map(|p| state.queue.remove(p)).is_some()
                };
                if !removed {
                    // A grant raced the cancellation; hand the permit back.
                    if rx.try_recv().is_ok() {
                        self.shared.release_one();
                    }
                }
                tracing::debug!(waiter = waiter_id, "queued caller cancelled");
                Err(EngineError::Cancelled)
            }
        }
    }

    /// Consume a permit, granting the head waiter if one is queued.
    ///
    /// Dropping a [`Permit`] has the same effect; this method is the
    /// explicit spelling for call sites that want the release visible.
    pub fn release(&self, permit: Permit) {
        drop(permit);
    }

    /// Permits currently held by callers.
    pub fn outstanding(&self) -> usize {
        self.shared.state.lock().outstanding
    }

    /// Callers currently queued for a permit.
    pub fn queue_depth(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Maximum concurrent permits.
    pub fn max_permits(&self) -> usize {
        self.shared.max_permits
    }
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("ConcurrencyLimiter")
            .field("max_permits", &self.shared.max_permits)
            .field("max_queue_length", &self.shared.max_queue_length)
            .field("outstanding", &state.outstanding)
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// The right to run one concurrent operation.
///
/// Released on drop, so early returns cannot leak a slot. The release and
/// the grant to the next queued caller happen inside one critical section.
pub struct Permit {
    shared: Arc<Shared>,
}

impl Permit {
    fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Explicitly return the permit. Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.shared.release_one();
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}
