//! Memoized lookup results.
//!
//! [`ResultCache`] maps `(operation, arguments)` to the outcome of running
//! that operation, for a fixed time-to-live. Outcomes are stored whatever
//! they are, failures included, so a query that found nothing keeps
//! answering from memory until its entry expires.
//!
//! The map is split into shards, each behind its own mutex. A lock is held
//! only for a map lookup or insert, never while the computation runs, so
//! callers computing different keys never wait on each other. Two callers
//! missing on the same key both compute; the last to finish is stored.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::BuildHasher;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tracing::trace;

/// Default time-to-live of a cached outcome.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Default number of shards.
pub const DEFAULT_SHARDS: usize = 16;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = add(*now, by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| at.checked_add_signed(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Cache key: operation name plus its positional arguments, as given.
///
/// Distinct request shapes must use distinct operation names, even when
/// their arguments overlap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: &'static str,
    args: Vec<String>,
}

impl CacheKey {
    /// Build a key.
    pub fn new<I, S>(operation: &'static str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Operation name.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.args.join(", "))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expiry: DateTime<Utc>,
    generation: u64,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: DateTime<Utc>, generation: u64) -> bool {
        now < self.expiry && self.generation == generation
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that ran the computation.
    pub misses: u64,
    /// Entries dropped for capacity.
    pub evictions: u64,
    /// Entries dropped because they expired or went stale.
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// Sharded TTL cache of computed outcomes.
pub struct ResultCache<V> {
    shards: Vec<Mutex<LruCache<CacheKey, CacheEntry<V>>>>,
    hasher: RandomState,
    ttl: Duration,
    capacity: Option<NonZeroUsize>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl<V: Clone> ResultCache<V> {
    /// Unbounded cache with the given TTL, [`DEFAULT_SHARDS`] shards and the wall clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::build(ttl, None, DEFAULT_SHARDS, Arc::new(SystemClock))
    }

    /// Bound the total number of entries; least recently used entries are evicted first.
    #[must_use]
    pub fn with_capacity(self, capacity: usize) -> Self {
        let shards = self.shards.len();
        Self::build(self.ttl, NonZeroUsize::new(capacity), shards, self.clock)
    }

    /// Change the number of shards (at least one).
    #[must_use]
    pub fn with_shards(self, shards: usize) -> Self {
        Self::build(self.ttl, self.capacity, shards, self.clock)
    }

    /// Use `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let shards = self.shards.len();
        Self::build(self.ttl, self.capacity, shards, clock)
    }

    fn build(
        ttl: Duration,
        capacity: Option<NonZeroUsize>,
        shards: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shards = shards.max(1);
        let per_shard = capacity.map(|cap| {
            NonZeroUsize::new(cap.get().div_ceil(shards)).unwrap_or(NonZeroUsize::MIN)
        });
        let shards = (0..shards)
            .map(|_| {
                Mutex::new(match per_shard {
                    Some(cap) => LruCache::new(cap),
                    None => LruCache::unbounded(),
                })
            })
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
            ttl,
            capacity,
            clock,
            counters: Counters::default(),
        }
    }

    /// Returns the cached outcome for `key`, or runs `compute` and caches its result.
    ///
    /// An entry is served only while unexpired and recorded at the same
    /// snapshot `generation` the caller is reading.
    pub fn get_or_compute<F>(&self, key: CacheKey, generation: u64, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        let shard = self.shard(&key);

        if let Some(value) = self.lookup(shard, &key, generation) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "result cache hit");
            return value;
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, generation, "result cache miss");

        let value = compute();
        let entry = CacheEntry {
            value: value.clone(),
            expiry: add(self.clock.now(), self.ttl),
            generation,
        };

        let evicted = lock(shard).push(key.clone(), entry);
        if matches!(evicted, Some((old, _)) if old != key) {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    fn lookup(
        &self,
        shard: &Mutex<LruCache<CacheKey, CacheEntry<V>>>,
        key: &CacheKey,
        generation: u64,
    ) -> Option<V> {
        let now = self.clock.now();
        let mut guard = lock(shard);
        let live = match guard.get(key) {
            Some(entry) if entry.is_live(now, generation) => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if live.is_none() {
            guard.pop(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
        }
        live
    }

    /// Drop every entry that has expired or was recorded before `generation`.
    pub fn purge_expired(&self, generation: u64) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut guard = lock(shard);
            let dead: Vec<CacheKey> = guard
                .iter()
                .filter(|(_, entry)| !entry.is_live(now, generation))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &dead {
                guard.pop(key);
            }
            removed += dead.len();
        }
        self.counters
            .expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        for shard in &self.shards {
            lock(shard).clear();
        }
    }

    /// Number of stored entries, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| lock(shard).len()).sum()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured capacity, `None` when unbounded.
    #[must_use]
    pub const fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    fn shard(&self, key: &CacheKey) -> &Mutex<LruCache<CacheKey, CacheEntry<V>>> {
        #[allow(clippy::cast_possible_truncation)]
        let idx = (self.hasher.hash_one(key) as usize) % self.shards.len();
        &self.shards[idx]
    }
}

// Entries are replaced whole, so a guard recovered from a poisoned lock is consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("shards", &self.shards.len())
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
