//! Offline/asset cache worker.
//!
//! Versioned named caches per resource class, with cache-first or
//! network-first strategies and bounded capacity.

mod classify;
mod order;
mod service;
mod storage;

pub use classify::{Classifier, ResourceClass};
pub use order::InsertionOrder;
pub use service::{CacheSize, CacheWorker, WorkerConfig};
pub use storage::{CacheStorage, NamedCache};
