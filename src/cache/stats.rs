//! Cache Statistics Module
//!
//! Diagnostic snapshot of the TTL cache.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of the TTL cache contents and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Current number of entries (expired ones not yet purged included)
    pub size: usize,
    /// Whether writes still reach the durable store
    pub has_durable_store: bool,
    /// Keys currently held
    pub keys: Vec<String>,
    /// Number of successful lookups
    pub hits: u64,
    /// Number of lookups that found nothing valid
    pub misses: u64,
    /// Number of entries dropped under persistence pressure
    pub evictions: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Counters ==
/// Running counters kept by the cache between snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Counters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }
}
