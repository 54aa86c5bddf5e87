//! Bounded LRU cache with per-entry expiry.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sentinel index marking the end of the recency list.
const NIL: usize = usize::MAX;

/// Capability interface for the cache seam.
///
/// The runner talks to its cache through this trait so alternative
/// implementations (a no-op cache, a recording cache in tests) can be
/// substituted without touching the runner.
pub trait Cache<K, V>: Send + Sync {
    /// Look up a live, non-expired entry. Absence is `None`, never an error.
    fn get(&self, key: &K) -> Option<V>;
    /// Insert or replace an entry. `None` ttl uses the configured default.
    fn set(&self, key: K, value: V, ttl: Option<Duration>);
    /// Remove an entry; returns whether it was present and live.
    fn delete(&self, key: &K) -> bool;
    /// Number of entries currently stored, expired stragglers included.
    fn len(&self) -> usize;
    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A cache that never hits and discards writes. Useful for callers that want
/// an uncached runner and for isolating runner behavior in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl<K: Send + Sync, V: Send + Sync> Cache<K, V> for NoopCache {
    fn get(&self, _key: &K) -> Option<V> {
        None
    }

    fn set(&self, _key: K, _value: V, _ttl: Option<Duration>) {}

    fn delete(&self, _key: &K) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }
}

/// One stored entry plus its position in the recency list.
struct Entry<K, V> {
    key: K,
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
    /// Towards more recently used.
    prev: usize,
    /// Towards less recently used.
    next: usize,
}

/// Map + slab-backed intrusive recency list. `head` is the most recently
/// used entry, `tail` the least. Entries never tie in recency: the list is a
/// strict total order, and entries that were only ever touched at insertion
/// keep insertion order, so eviction ties break towards the oldest insertion.
struct CacheInner<K, V> {
    map: HashMap<K, usize>,
    slots: Vec<Option<Entry<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    /// Earliest expiry that may still be linked. May point earlier than the
    /// true minimum after lazy removals; a sweep then finds nothing and
    /// recomputes it. Never points later.
    next_expiry: Option<Instant>,
}

impl<K: Eq + Hash + Clone, V> CacheInner<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            next_expiry: None,
        }
    }

    /// Record that an entry expiring at `at` now exists.
    fn note_expiry(&mut self, at: Instant) {
        self.next_expiry = Some(self.next_expiry.map_or(at, |cur| cur.min(at)));
    }

    /// Remove every entry whose deadline has passed and recompute the
    /// watermark from the survivors. Returns the number removed.
    fn sweep_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.as_ref()
                    .filter(|e| e.expires_at <= now)
                    .map(|_| idx)
            })
            .collect();
        let count = expired.len();
        for idx in expired {
            self.remove(idx);
        }
        self.next_expiry = self.slots.iter().flatten().map(|e| e.expires_at).min();
        count
    }

    /// Unlink `idx` from the recency list without touching the map or slab.
    fn detach(&mut self, idx: usize) {
        let Some((prev, next)) = self
            .slots
            .get(idx)
            .and_then(Option::as_ref)
            .map(|e| (e.prev, e.next))
        else {
            return;
        };
        if prev == NIL {
            self.head = next;
        } else if let Some(Some(p)) = self.slots.get_mut(prev) {
            p.next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else if let Some(Some(n)) = self.slots.get_mut(next) {
            n.prev = prev;
        }
    }

    /// Link `idx` at the head (most recently used) of the recency list.
    fn attach_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(Some(e)) = self.slots.get_mut(idx) {
            e.prev = NIL;
            e.next = old_head;
        }
        if old_head == NIL {
            self.tail = idx;
        } else if let Some(Some(h)) = self.slots.get_mut(old_head) {
            h.prev = idx;
        }
        self.head = idx;
    }

    /// Move an already-linked entry to the head.
    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.detach(idx);
        self.attach_front(idx);
    }

    /// Remove an entry entirely: list, map, and slab.
    fn remove(&mut self, idx: usize) -> Option<Entry<K, V>> {
        self.detach(idx);
        let entry = self.slots.get_mut(idx).and_then(Option::take)?;
        self.map.remove(&entry.key);
        self.free.push(idx);
        Some(entry)
    }

    /// Store a new entry and link it at the head. Returns its slot index.
    fn insert(&mut self, entry: Entry<K, V>) -> usize {
        let key = entry.key.clone();
        let expires_at = entry.expires_at;
        let idx = if let Some(idx) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(idx) {
                *slot = Some(entry);
            }
            idx
        } else {
            self.slots.push(Some(entry));
            self.slots.len() - 1
        };
        self.map.insert(key, idx);
        self.note_expiry(expires_at);
        self.attach_front(idx);
        idx
    }
}

/// Fixed-capacity key/value store with access-based LRU eviction and
/// per-entry expiry.
///
/// All operations take `&self`; the whole structure is guarded by a single
/// short-held [`parking_lot::Mutex`] per operation, never held across caller
/// code. Get, set, and delete are O(1) amortized.
///
/// Expiry is lazy: an entry whose deadline has passed is treated as absent
/// and removed when it is next touched. [`BoundedCache::purge_expired`]
/// sweeps eagerly for callers that run periodic cleanup.
pub struct BoundedCache<K, V> {
    inner: Mutex<CacheInner<K, V>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries, using
    /// `default_ttl` when `set` omits an explicit ttl.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::new(capacity)),
            capacity,
            default_ttl,
        }
    }

    /// Maximum number of entries this cache will hold.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every expired entry now instead of waiting for lazy expiry.
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let count = self.inner.lock().sweep_expired(Instant::now());
        if count > 0 {
            tracing::debug!(count, "purged expired cache entries");
        }
        count
    }
}

impl<K, V> Cache<K, V> for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let idx = *inner.map.get(key)?;
        let live = inner
            .slots
            .get(idx)
            .and_then(Option::as_ref)
            .is_some_and(|e| e.expires_at > now);
        if !live {
            inner.remove(idx);
            tracing::debug!("cache entry expired on access");
            return None;
        }
        inner.touch(idx);
        inner
            .slots
            .get(idx)
            .and_then(Option::as_ref)
            .map(|e| e.value.clone())
    }

    fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let expires_at = now + ttl.unwrap_or(self.default_ttl);
        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.map.get(&key) {
            // Replace resets value, recency, and expiry.
            if let Some(Some(e)) = inner.slots.get_mut(idx) {
                e.value = value;
                e.inserted_at = now;
                e.expires_at = expires_at;
            }
            inner.note_expiry(expires_at);
            inner.touch(idx);
            return;
        }
        if inner.map.len() >= self.capacity {
            // Reclaim expired stragglers before displacing a live entry.
            // The watermark makes this a no-op unless a deadline has passed.
            let swept = match inner.next_expiry {
                Some(at) if at <= now => inner.sweep_expired(now),
                _ => 0,
            };
            if swept > 0 {
                tracing::debug!(swept, "reclaimed expired cache entries at capacity");
            } else {
                let lru = inner.tail;
                if lru != NIL {
                    if let Some(evicted) = inner.remove(lru) {
                        tracing::debug!(
                            age_ms = u64::try_from(evicted.inserted_at.elapsed().as_millis())
                                .unwrap_or(u64::MAX),
                            "evicted least-recently-used cache entry"
                        );
                    }
                }
            }
        }
        inner.insert(Entry {
            key,
            value,
            inserted_at: now,
            expires_at,
            prev: NIL,
            next: NIL,
        });
    }

    fn delete(&self, key: &K) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let Some(&idx) = inner.map.get(key) else {
            return false;
        };
        let live = inner
            .slots
            .get(idx)
            .and_then(Option::as_ref)
            .is_some_and(|e| e.expires_at > now);
        inner.remove(idx);
        live
    }

    fn len(&self) -> usize {
        self.inner.lock().map.len()
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().map.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
