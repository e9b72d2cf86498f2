//! In-memory selector cache with TTL expiry and frequency-then-recency eviction.
//!
//! Keys are source keys: a document key, `fs://<path>` for files on disk, or
//! the URL of a remote stylesheet. Each entry carries a freshness token (edit
//! version, mtime in milliseconds, or `-1` for remote sources) that callers
//! compare against the source's current token.
//!
//! Eviction ranks entries by `(access_count, last_access)` rather than pure
//! recency: a large workspace stylesheet survives pressure from small,
//! frequently edited documents only if it is itself read often.
//!
//! The cache is the only shared mutable state of the engine. Reads reorder
//! entries, so every access goes through [`SharedStyleCache`]'s mutex.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{XrefError, XrefResult};
use crate::selector::Selector;

/// Default maximum number of entries.
pub const DEFAULT_MAX_ENTRIES: usize = 300;

/// Default time-to-live since last access.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Freshness token for remote stylesheets; only TTL expiry invalidates them.
pub const REMOTE_FRESHNESS: i64 = -1;

/// Millisecond clock used for TTL bookkeeping.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> u64;
}

/// Monotonic wall clock.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Logical clock advanced by hand.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// What a cache hit hands back.
#[derive(Debug, Clone)]
pub struct CachedSelectors {
    pub freshness: i64,
    pub selectors: Arc<Vec<Selector>>,
}

#[derive(Debug)]
struct CacheEntry {
    freshness: i64,
    selectors: Arc<Vec<Selector>>,
    last_access: u64,
    access_count: u64,
}

/// Bounded TTL cache of parsed selector lists.
#[derive(Debug)]
pub struct StyleCache {
    /// Iteration order is least- to most-recently used.
    entries: IndexMap<String, CacheEntry>,
    max_entries: usize,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl StyleCache {
    pub fn new(max_entries: usize, ttl: Duration) -> XrefResult<Self> {
        Self::with_clock(max_entries, ttl, Arc::new(SystemClock::default()))
    }

    pub fn with_clock(max_entries: usize, ttl: Duration, clock: Arc<dyn Clock>) -> XrefResult<Self> {
        if max_entries == 0 {
            return Err(XrefError::invalid_argument("cache capacity must be at least 1"));
        }
        Ok(Self {
            entries: IndexMap::with_capacity(max_entries.min(1024)),
            max_entries,
            ttl_ms: ttl.as_millis() as u64,
            clock,
        })
    }

    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.last_access) > self.ttl_ms
    }

    /// Looks up `key`, refreshing its access statistics on a hit.
    pub fn get(&mut self, key: &str) -> Option<CachedSelectors> {
        let now = self.clock.now_ms();
        let expired = self.is_expired(self.entries.get(key)?, now);
        if expired {
            debug!(key, "cache entry expired");
            self.entries.shift_remove(key);
            return None;
        }

        // Move to the most-recently-used end.
        let mut entry = self.entries.shift_remove(key)?;
        entry.access_count += 1;
        entry.last_access = now;
        let hit = CachedSelectors {
            freshness: entry.freshness,
            selectors: Arc::clone(&entry.selectors),
        };
        self.entries.insert(key.to_string(), entry);
        Some(hit)
    }

    /// Returns the cached selectors only when the entry matches `freshness`.
    /// A stale entry is removed.
    pub fn get_fresh(&mut self, key: &str, freshness: i64) -> Option<Arc<Vec<Selector>>> {
        let hit = self.get(key)?;
        if hit.freshness == freshness {
            debug!(key, "cache hit");
            Some(hit.selectors)
        } else {
            debug!(key, cached = hit.freshness, current = freshness, "cache entry stale");
            self.entries.shift_remove(key);
            None
        }
    }

    /// Inserts or overwrites an entry, evicting first if needed.
    pub fn set(&mut self, key: impl Into<String>, freshness: i64, selectors: Arc<Vec<Selector>>) {
        let key = key.into();
        self.evict(&key);
        let now = self.clock.now_ms();
        self.entries.shift_remove(&key);
        self.entries.insert(
            key,
            CacheEntry {
                freshness,
                selectors,
                last_access: now,
                access_count: 1,
            },
        );
    }

    /// Drops expired entries, then the lowest-ranked ~20% if `incoming`
    /// would not fit.
    fn evict(&mut self, incoming: &str) {
        let now = self.clock.now_ms();
        let ttl = self.ttl_ms;
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.last_access) <= ttl);

        let len = self.entries.len();
        if self.entries.contains_key(incoming) || len < self.max_entries {
            return;
        }

        let excess = len + 1 - self.max_entries;
        let count = (len / 5).max(excess);

        let mut ranked: Vec<(u64, u64, usize)> = self
            .entries
            .values()
            .enumerate()
            .map(|(pos, e)| (e.access_count, e.last_access, pos))
            .collect();
        ranked.sort_unstable();

        let victims: Vec<String> = ranked
            .iter()
            .take(count)
            .filter_map(|&(_, _, pos)| self.entries.get_index(pos).map(|(k, _)| k.clone()))
            .collect();

        debug!(evicted = victims.len(), size = len, "cache eviction");
        for key in victims {
            self.entries.shift_remove(&key);
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of physically present entries (expired ones included until swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache handle shared between the aggregator, its I/O tasks and the server.
pub type SharedStyleCache = Arc<Mutex<StyleCache>>;

/// Wraps a cache for sharing.
pub fn shared(cache: StyleCache) -> SharedStyleCache {
    Arc::new(Mutex::new(cache))
}

/// Locks the shared cache. A poisoned lock is recovered: every cache operation
/// leaves the map consistent before it can panic.
pub fn lock(cache: &SharedStyleCache) -> MutexGuard<'_, StyleCache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
