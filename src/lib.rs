//! Reseller Shield - resilience layer for the reseller landing page
//!
//! Keeps the page usable when its REST backend is slow or down: a TTL cache
//! with durable persistence, per-endpoint circuit breakers, timeout-bounded
//! fetch with transport fallback, a cached health monitor, a cache-aware
//! fetch facade and an offline cache worker fronting the origin.

pub mod api;
pub mod breaker;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod health;
pub mod models;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use client::CachedFetcher;
pub use config::Config;
pub use error::{FetchError, ShieldError, WorkerError};
pub use tasks::{spawn_cleanup_task, spawn_health_poller, spawn_sweep_task};
