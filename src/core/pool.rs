//! Bounded pool of reusable, expensive-to-construct resources.

use std::collections::{HashSet, VecDeque};
use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use uuid::Uuid;

use crate::core::error::{AppResult, EngineError};
use crate::util::cancel::CancelToken;

/// Lifecycle hooks for pooled resources.
///
/// No pool lock is ever held across a call into these hooks, so they may
/// take as long as they need (open a connection, warm a buffer) without
/// blocking unrelated pool operations.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    /// The resource type this factory produces.
    type Resource: Send + 'static;

    /// Construct a new resource. A failure propagates to the acquiring
    /// caller and returns the reserved slot to constructible state.
    async fn create(&self) -> AppResult<Self::Resource>;

    /// Erase prior usage state before the resource is handed out again.
    async fn reset(&self, _resource: &mut Self::Resource) {}

    /// Dispose of a resource on drain. Defaults to dropping it.
    async fn dispose(&self, resource: Self::Resource) {
        drop(resource);
    }
}

/// Factory for pool-less runner stacks; never actually invoked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFactory;

#[async_trait]
impl ResourceFactory for NoopFactory {
    type Resource = ();

    async fn create(&self) -> AppResult<()> {
        Ok(())
    }
}

/// A checked-out resource. Deref gives access to the underlying resource;
/// hand the item back with [`ResourcePool::release`].
pub struct PooledItem<R> {
    id: Uuid,
    resource: R,
}

impl<R> PooledItem<R> {
    fn new(resource: R) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource,
        }
    }

    /// Stable identity of this pooled resource, used to validate release.
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

impl<R> Deref for PooledItem<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R> DerefMut for PooledItem<R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}

impl<R> std::fmt::Debug for PooledItem<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledItem")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Idle resources ready to hand out.
    pub idle: usize,
    /// Resources currently checked out.
    pub in_use: usize,
    /// Maximum resources this pool will construct.
    pub capacity: usize,
}

/// Sent to a queued acquirer when something changes on its behalf.
enum Wake<R> {
    /// A released, reset resource handed over directly.
    Item(PooledItem<R>),
    /// A construction slot opened up; retry the acquire loop.
    Slot,
}

struct PoolWaiter<R> {
    id: u64,
    tx: oneshot::Sender<Wake<R>>,
}

struct PoolState<R> {
    idle: VecDeque<PooledItem<R>>,
    checked_out: HashSet<Uuid>,
    /// Factory calls currently in flight; they hold a slot reservation.
    constructing: usize,
    waiters: VecDeque<PoolWaiter<R>>,
    next_waiter_id: u64,
    draining: bool,
}

impl<R> PoolState<R> {
    fn total(&self) -> usize {
        self.idle.len() + self.checked_out.len() + self.constructing
    }
}

/// Manages a bounded set of reusable objects with an explicit
/// acquire/release lifecycle.
///
/// Invariant: idle + checked-out + under-construction never exceeds the
/// configured size. Blocking acquirers wait in FIFO order; a release hands
/// the reset resource directly to the oldest waiter.
pub struct ResourcePool<F: ResourceFactory> {
    factory: F,
    pool_size: usize,
    state: Mutex<PoolState<F::Resource>>,
    /// Signalled whenever an in-flight item returns during drain.
    drain_done: Notify,
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Create a pool that will construct at most `pool_size` resources via
    /// `factory`.
    pub fn new(pool_size: usize, factory: F) -> Self {
        Self {
            factory,
            pool_size,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                checked_out: HashSet::new(),
                constructing: 0,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
                draining: false,
            }),
            drain_done: Notify::new(),
        }
    }

    /// Acquire a resource.
    ///
    /// Hands out an idle item when one exists, constructs a new one while
    /// under the size limit, and otherwise either suspends the caller in
    /// FIFO order (`blocking = true`) until a release, or fails immediately
    /// with [`EngineError::PoolExhausted`] (`blocking = false`).
    pub async fn acquire(&self, blocking: bool) -> Result<PooledItem<F::Resource>, EngineError> {
        self.acquire_inner(blocking, None).await
    }

    /// [`ResourcePool::acquire`] with a cancellation signal. A fired token
    /// while suspended removes the waiter and returns
    /// [`EngineError::Cancelled`].
    pub async fn acquire_cancellable(
        &self,
        blocking: bool,
        cancel: Option<&CancelToken>,
    ) -> Result<PooledItem<F::Resource>, EngineError> {
        self.acquire_inner(blocking, cancel).await
    }

    async fn acquire_inner(
        &self,
        blocking: bool,
        cancel: Option<&CancelToken>,
    ) -> Result<PooledItem<F::Resource>, EngineError> {
        loop {
            let waiting = {
                let mut state = self.state.lock();
                if state.draining {
                    return Err(EngineError::Draining);
                }
                if let Some(item) = state.idle.pop_front() {
                    state.checked_out.insert(item.id);
                    return Ok(item);
                }
                if state.total() < self.pool_size {
                    state.constructing += 1;
                    None
                } else if blocking {
                    let (tx, rx) = oneshot::channel();
                    let id = state.next_waiter_id;
                    state.next_waiter_id += 1;
                    state.waiters.push_back(PoolWaiter { id, tx });
                    tracing::debug!(waiter = id, "caller queued for pooled resource");
                    Some((id, rx))
                } else {
                    return Err(EngineError::PoolExhausted);
                }
            };

            let Some((waiter_id, rx)) = waiting else {
                return self.construct().await;
            };

            match self.wait_for_wake(waiter_id, rx, cancel).await? {
                Some(item) => return Ok(item),
                // Construction slot opened; run the admission checks again.
                None => continue,
            }
        }
    }

    /// Run the factory outside the lock against a reserved slot.
    async fn construct(&self) -> Result<PooledItem<F::Resource>, EngineError> {
        match self.factory.create().await {
            Ok(resource) => {
                let item = PooledItem::new(resource);
                // The guard must leave scope before any await so the
                // future stays Send; an explicit drop is not enough for
                // the compiler's analysis.
                let admitted = {
                    let mut state = self.state.lock();
                    state.constructing -= 1;
                    if state.draining {
                        false
                    } else {
                        state.checked_out.insert(item.id);
                        true
                    }
                };
                if !admitted {
                    self.factory.dispose(item.resource).await;
                    self.drain_done.notify_waiters();
                    return Err(EngineError::Draining);
                }
                tracing::debug!(id = %item.id, "constructed pooled resource");
                Ok(item)
            }
            Err(e) => {
                let mut state = self.state.lock();
                state.constructing -= 1;
                // The slot is constructible again; let the oldest waiter
                // retry so the capacity is not stranded.
                while let Some(waiter) = state.waiters.pop_front() {
                    if waiter.tx.send(Wake::Slot).is_ok() {
                        break;
                    }
                }
                drop(state);
                self.drain_done.notify_waiters();
                tracing::warn!(error = %e, "resource construction failed");
                Err(EngineError::Factory(e))
            }
        }
    }

    /// Suspend on the waiter channel, handling cancellation and grant races.
    async fn wait_for_wake(
        &self,
        waiter_id: u64,
        mut rx: oneshot::Receiver<Wake<F::Resource>>,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<PooledItem<F::Resource>>, EngineError> {
        let wake = if let Some(token) = cancel {
            tokio::select! {
                biased;
                wake = &mut rx => wake,
                () = token.cancelled() => {
                    let removed = {
                        let mut state = self.state.lock();
                        let pos = state.waiters.iter().position(|w| w.id == waiter_id);
                        pos.and_then(|p| state.waiters.remove(p)).is_some()
                    };
                    if !removed {
                        // A handoff raced the cancellation; put it back.
                        if let Ok(Wake::Item(item)) = rx.try_recv() {
                            self.requeue(item).await;
                        }
                    }
                    tracing::debug!(waiter = waiter_id, "pool waiter cancelled");
                    return Err(EngineError::Cancelled);
                }
            }
        } else {
            rx.await
        };

        match wake {
            Ok(Wake::Item(item)) => Ok(Some(item)),
            Ok(Wake::Slot) => Ok(None),
            // Waiters are dropped wholesale when a drain begins.
            Err(_) => Err(EngineError::Draining),
        }
    }

    /// Return a clean item to the idle set or hand it to the next waiter.
    /// Used by the cancellation race path; the item was already reset.
    async fn requeue(&self, item: PooledItem<F::Resource>) {
        // Scope the guard so the future stays Send across the dispose await.
        let disposing = {
            let mut state = self.state.lock();
            state.checked_out.remove(&item.id);
            if state.draining {
                Some(item)
            } else {
                Self::hand_off_or_park(&mut state, item);
                None
            }
        };
        if let Some(item) = disposing {
            self.factory.dispose(item.resource).await;
            self.drain_done.notify_waiters();
        }
    }

    /// Give `item` to the oldest live waiter, or park it idle.
    /// Caller holds the state lock.
    fn hand_off_or_park(state: &mut PoolState<F::Resource>, mut item: PooledItem<F::Resource>) {
        while let Some(waiter) = state.waiters.pop_front() {
            state.checked_out.insert(item.id);
            match waiter.tx.send(Wake::Item(item)) {
                Ok(()) => return,
                Err(Wake::Item(returned)) => {
                    // Waiter gave up; reclaim and try the next one.
                    state.checked_out.remove(&returned.id);
                    item = returned;
                }
                Err(Wake::Slot) => return,
            }
        }
        state.idle.push_back(item);
    }

    /// Return a checked-out item to the pool.
    ///
    /// Runs the factory's `reset` hook (outside any lock), then hands the
    /// resource to the oldest waiter or parks it idle. Releasing an item
    /// that is not checked out is a programming error and fails with
    /// [`EngineError::InvalidRelease`] without touching pool bookkeeping.
    pub async fn release(&self, mut item: PooledItem<F::Resource>) -> Result<(), EngineError> {
        {
            let state = self.state.lock();
            if !state.checked_out.contains(&item.id) {
                tracing::error!(id = %item.id, "release of item that is not checked out");
                return Err(EngineError::InvalidRelease(item.id));
            }
        }
        self.factory.reset(&mut item.resource).await;

        // Scope the guard so the future stays Send across the dispose await.
        let disposing = {
            let mut state = self.state.lock();
            state.checked_out.remove(&item.id);
            if state.draining {
                Some(item)
            } else {
                Self::hand_off_or_park(&mut state, item);
                None
            }
        };
        if let Some(item) = disposing {
            self.factory.dispose(item.resource).await;
            self.drain_done.notify_waiters();
        }
        Ok(())
    }

    /// Scoped shutdown: dispose all idle items and wait until every in-use
    /// and under-construction item has come back and been disposed.
    ///
    /// Once a drain begins, queued waiters fail with
    /// [`EngineError::Draining`] and new acquires are refused.
    pub async fn drain(&self) {
        let idle = {
            let mut state = self.state.lock();
            state.draining = true;
            // Dropping the waiters closes their channels; they observe
            // Draining instead of waiting forever.
            state.waiters.clear();
            std::mem::take(&mut state.idle)
        };
        let disposed = idle.len();
        for item in idle {
            self.factory.dispose(item.resource).await;
        }
        tracing::debug!(disposed, "drained idle pool resources");

        loop {
            let notified = self.drain_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state.lock();
                if state.checked_out.is_empty() && state.constructing == 0 {
                    break;
                }
            }
            notified.await;
        }
        tracing::debug!("pool drain complete");
    }

    /// Snapshot of current occupancy.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            idle: state.idle.len(),
            in_use: state.checked_out.len(),
            capacity: self.pool_size,
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for ResourcePool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResourcePool")
            .field("capacity", &stats.capacity)
            .field("idle", &stats.idle)
            .field("in_use", &stats.in_use)
            .finish()
    }
}
