//! Cache Module
//!
//! Provides the TTL cache used to avoid redundant network calls, with
//! best-effort durable persistence.

mod durable;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use durable::{DurableStore, FileStore, MemoryStore};
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::{eviction_count, TtlCache};

// == Public Constants ==
/// Share of entries evicted when a durable write fails, in percent
pub const EVICTION_FRACTION_PERCENT: usize = 30;

/// Default storage budget for the durable blob, in bytes
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;
