//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached value with the time it was stored and how long it stays valid.
///
/// Field names match the persisted blob format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// The stored value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub timestamp: u64,
    /// Lifetime in milliseconds
    pub expiry: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stored at `now_ms` that lives for `expiry_ms`.
    pub fn new(data: T, now_ms: u64, expiry_ms: u64) -> Self {
        Self {
            data,
            timestamp: now_ms,
            expiry: expiry_ms,
        }
    }

    // == Expires At ==
    /// Instant (Unix milliseconds) at which the entry stops being valid.
    pub fn expires_at(&self) -> u64 {
        self.timestamp.saturating_add(self.expiry)
    }

    // == Is Valid ==
    /// An entry is valid strictly before `timestamp + expiry`.
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at()
    }

    /// Inverse of [`is_valid_at`](Self::is_valid_at).
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        !self.is_valid_at(now_ms)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_valid_before_expiry() {
        let entry = CacheEntry::new("v", 0, 1000);

        assert!(entry.is_valid_at(0));
        assert!(entry.is_valid_at(999));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new("v", 0, 1000);

        // Expired exactly at timestamp + expiry
        assert!(entry.is_expired_at(1000));
        assert!(entry.is_expired_at(1001));
    }

    #[test]
    fn test_zero_expiry_is_never_valid() {
        let entry = CacheEntry::new("v", 500, 0);
        assert!(entry.is_expired_at(500));
    }

    #[test]
    fn test_entry_blob_field_names() {
        let entry = CacheEntry::new(serde_json::json!({"title": "Hero"}), 42, 300_000);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["data"]["title"], "Hero");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["expiry"], 300_000);
    }

    #[test]
    fn test_expires_at_saturates() {
        let entry = CacheEntry::new((), u64::MAX - 1, 10);
        assert_eq!(entry.expires_at(), u64::MAX);
    }
}
