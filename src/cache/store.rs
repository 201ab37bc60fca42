//! TTL Cache Module
//!
//! Key/value store with per-entry expiry and best-effort durable persistence.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::durable::DurableStore;
use crate::cache::stats::Counters;
use crate::cache::{CacheEntry, CacheStats, EVICTION_FRACTION_PERCENT};
use crate::clock::{duration_ms, SharedClock};
use crate::error::StoreError;

// == TTL Cache ==
/// In-memory TTL cache mirrored to an optional durable store.
///
/// Expiry is evaluated lazily on every read. Persistence is best-effort:
/// when a write fails the oldest entries are evicted and the write retried
/// once; a second failure switches the cache to memory-only for the rest of
/// its lifetime. None of this is visible to callers.
pub struct TtlCache<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Durable mirror, `None` once persistence has been given up
    durable: Option<Box<dyn DurableStore>>,
    clock: SharedClock,
    counters: Counters,
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("size", &self.entries.len())
            .field("has_durable_store", &self.durable.is_some())
            .finish()
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    // == Constructors ==
    /// Creates a memory-only cache.
    pub fn new(clock: SharedClock) -> Self {
        Self {
            entries: HashMap::new(),
            durable: None,
            clock,
            counters: Counters::default(),
        }
    }

    /// Creates a cache mirrored to `store`.
    ///
    /// Entries already in the store are loaded and the expired ones purged
    /// straight away. An unreadable blob is discarded.
    pub fn with_store(store: Box<dyn DurableStore>, clock: SharedClock) -> Self {
        let entries = match Self::load_entries(store.as_ref()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Discarding unreadable cache blob: {}", e);
                HashMap::new()
            }
        };

        let mut cache = Self {
            entries,
            durable: Some(store),
            clock,
            counters: Counters::default(),
        };

        let loaded = cache.entries.len();
        let purged = cache.purge_expired();
        if purged > 0 {
            cache.persist();
        }
        info!(
            "TTL cache restored {} entries ({} expired on load)",
            loaded - purged,
            purged
        );

        cache
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`. Overwrites any previous entry.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = self.clock.now_ms();
        let key = key.into();
        debug!("Caching {} for {}ms", key, duration_ms(ttl));
        self.entries
            .insert(key, CacheEntry::new(value, now, duration_ms(ttl)));
        self.persist();
    }

    // == Get ==
    /// Returns the value if present and not expired.
    ///
    /// An expired entry is removed and the durable store updated.
    pub fn get(&mut self, key: &str) -> Option<V> {
        if self.check_valid(key) {
            self.counters.record_hit();
            self.entries.get(key).map(|entry| entry.data.clone())
        } else {
            self.counters.record_miss();
            None
        }
    }

    // == Has ==
    /// Same expiry semantics as [`get`](Self::get) without cloning the value.
    pub fn has(&mut self, key: &str) -> bool {
        self.check_valid(key)
    }

    // == Delete ==
    /// Removes an entry. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    // == Clear ==
    /// Drops every entry from memory and from the durable store.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(store) = &self.durable {
            if let Err(e) = store.clear() {
                warn!("Failed to clear durable cache: {}", e);
            }
        }
    }

    // == Stats ==
    /// Returns a diagnostic snapshot.
    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();

        CacheStats {
            size: self.entries.len(),
            has_durable_store: self.durable.is_some(),
            keys,
            hits: self.counters.hits,
            misses: self.counters.misses,
            evictions: self.counters.evictions,
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let removed = self.purge_expired();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether writes still reach the durable store.
    pub fn has_durable_store(&self) -> bool {
        self.durable.is_some()
    }

    // == Internals ==

    /// Lazy expiry: true if `key` holds a valid entry, removing it otherwise.
    fn check_valid(&mut self, key: &str) -> bool {
        let now = self.clock.now_ms();
        match self.entries.get(key) {
            Some(entry) if entry.is_valid_at(now) => true,
            Some(_) => {
                debug!("Cache entry {} expired", key);
                self.entries.remove(key);
                self.persist();
                false
            }
            None => false,
        }
    }

    fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        before - self.entries.len()
    }

    /// Writes the map; on failure evicts the oldest entries and retries once,
    /// then gives up on persistence.
    fn persist(&mut self) {
        let first = match &self.durable {
            Some(store) => Self::save_entries(store.as_ref(), &self.entries),
            None => return,
        };
        let Err(first_err) = first else {
            return;
        };

        let evicted = self.evict_oldest();
        warn!(
            "Cache persistence failed ({}), evicted {} oldest entries",
            first_err, evicted
        );

        let retry = match &self.durable {
            Some(store) => Self::save_entries(store.as_ref(), &self.entries),
            None => return,
        };
        if let Err(e) = retry {
            warn!(
                "Cache persistence failed again ({}), continuing in memory only",
                e
            );
            self.durable = None;
        }
    }

    /// Removes the oldest 30% of entries (rounded up) by timestamp.
    fn evict_oldest(&mut self) -> usize {
        let count = eviction_count(self.entries.len());

        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.timestamp, key.clone()))
            .collect();
        by_age.sort();

        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        self.counters.record_evictions(count);
        count
    }

    fn load_entries(
        store: &dyn DurableStore,
    ) -> Result<HashMap<String, CacheEntry<V>>, StoreError> {
        match store.load()? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(HashMap::new()),
        }
    }

    fn save_entries(
        store: &dyn DurableStore,
        entries: &HashMap<String, CacheEntry<V>>,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(entries)?;
        store.save(&blob)
    }
}

/// Number of entries dropped by one eviction round: 30% rounded up.
pub fn eviction_count(len: usize) -> usize {
    (len * EVICTION_FRACTION_PERCENT).div_ceil(100)
}
