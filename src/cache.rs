//! In-memory TTL cache for API responses.
//!
//! Entries carry an absolute expiry. Expiry is enforced lazily: `get` deletes
//! an expired entry when it finds one, and a background sweep (`cleanup`)
//! removes entries that are never read again. Until one of those runs, an
//! expired entry still occupies memory and is counted by `len`.
//!
//! Invalidation bumps a generation counter. A writer that read the generation
//! before doing slow work can use [`TtlCache::set_if_generation`] so a value
//! computed before an invalidation is never stored after it.
//!
//! Time comes from `tokio::time::Instant` so tests can pause and advance the
//! clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::trace;

use crate::utils::deadline_after;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Thread-safe key/value cache with per-entry TTL.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    generation: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Store `value` under `key`, replacing any existing entry and its expiry.
    ///
    /// A TTL too large to represent is clamped to a far-future expiry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(key.into(), Self::new_entry(value, ttl));
    }

    /// Current invalidation generation. Changes on every `invalidate` and `clear`.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Store `value` only if no invalidation has happened since `generation`
    /// was read. Returns whether the value was stored.
    pub fn set_if_generation(
        &self,
        key: impl Into<String>,
        value: V,
        ttl: Duration,
        generation: u64,
    ) -> bool {
        // The shard lock is held across the check. An invalidation bumps the
        // generation before it sweeps, so it either fails this check or
        // removes the entry once the lock is released.
        let slot = self.entries.entry(key.into());
        if self.generation() != generation {
            return false;
        }
        slot.insert(Self::new_entry(value, ttl));
        true
    }

    /// Return the value for `key` if present and unexpired.
    ///
    /// This read may mutate: an expired entry is removed before `None` is
    /// returned. Use [`TtlCache::peek`] for a side-effect free lookup.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            // Release the shard read guard before taking the write lock
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            trace!(key, "Evicted expired cache entry on read");
        }
        None
    }

    /// Look up `key` without evicting it when expired.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    /// Remove every expired entry and return how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Remove entries whose key contains `pattern`, or everything when `None`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let before = self.entries.len();
        match pattern {
            Some(pattern) => self.entries.retain(|key, _| !key.contains(pattern)),
            None => self.entries.clear(),
        }
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn new_entry(value: V, ttl: Duration) -> CacheEntry<V> {
        CacheEntry {
            value,
            expires_at: deadline_after(Instant::now(), ttl),
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
