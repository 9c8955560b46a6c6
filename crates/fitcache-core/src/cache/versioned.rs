//! In-memory versioned cache with TTL reads and LRU eviction.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::clock::{system_clock, SharedClock};

use super::entry::{CacheTtl, CachedData};

/// Default number of entries kept before the least recently used is evicted.
/// Four record kinds per user, so 64 leaves room for several accounts.
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(n) => n,
    None => unreachable!(),
};

/// Version stamped on entries whose record carries none.
pub const DEFAULT_ENTRY_VERSION: u64 = 1;

/// Answers "is there a fresh-enough copy of X" without a round trip.
///
/// Entries past their TTL stay in the map until evicted or overwritten, but
/// `get` treats them as misses.
pub struct VersionedCache<T> {
    entries: LruCache<String, CachedData<T>>,
    clock: SharedClock,
}

impl<T> VersionedCache<T> {
    pub fn new(capacity: NonZeroUsize, clock: SharedClock) -> Self {
        Self {
            entries: LruCache::new(capacity),
            clock,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CACHE_CAPACITY);
        Self::new(capacity, system_clock())
    }

    /// Cached data if present and younger than `ttl`.
    pub fn get(&mut self, key: &str, ttl: CacheTtl) -> Option<&T> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(ttl, now) => {
                debug!(key, version = entry.version, "Cache hit");
                Some(&entry.data)
            }
            Some(entry) => {
                debug!(key, age_minutes = entry.age_minutes(now), "Cache entry stale");
                None
            }
            None => {
                debug!(key, "Cache miss");
                None
            }
        }
    }

    /// The stored entry regardless of age. Does not touch recency.
    pub fn entry(&self, key: &str) -> Option<&CachedData<T>> {
        self.entries.peek(key)
    }

    pub fn version(&self, key: &str) -> Option<u64> {
        self.entry(key).map(|e| e.version)
    }

    /// Insert or overwrite, stamping the current time.
    pub fn set(&mut self, key: impl Into<String>, data: T, version: u64) {
        let key = key.into();
        let entry = CachedData::new(data, version, self.clock.now());
        if let Some((evicted, _)) = self.entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(key = %evicted, "Evicted least recently used cache entry");
            }
        }
    }

    /// Remove one entry, or everything when `key` is `None`.
    pub fn invalidate(&mut self, key: Option<&str>) {
        match key {
            Some(key) => {
                self.entries.pop(key);
            }
            None => self.entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

impl<T> Default for VersionedCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, system_clock())
    }
}

impl<T: Clone> Clone for VersionedCache<T> {
    fn clone(&self) -> Self {
        let mut entries = LruCache::new(self.entries.cap());
        // iter() runs most to least recent; replay oldest first to keep order
        for (key, entry) in self.entries.iter().rev() {
            entries.put(key.clone(), entry.clone());
        }
        Self {
            entries,
            clock: self.clock.clone(),
        }
    }
}

impl<T> std::fmt::Debug for VersionedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.entries.cap())
            .finish()
    }
}
