//! Background Tasks Module
//!
//! Periodic work owned by the binary. Every spawner returns a `JoinHandle`
//! that is aborted on shutdown.
//!
//! # Tasks
//! - TTL cleanup: purges expired JSON cache entries
//! - Breaker sweep: drops idle circuit records
//! - Health poller: refreshes the backend health verdict

mod cleanup;
mod health;
mod sweep;

use std::time::Duration;

pub use cleanup::spawn_cleanup_task;
pub use health::spawn_health_poller;
pub use sweep::spawn_sweep_task;

/// Shortest period a task will run at. A zero period would panic
/// `tokio::time::interval` and spin the sleep loops.
const MIN_PERIOD: Duration = Duration::from_millis(1);

fn clamp_period(period: Duration) -> Duration {
    period.max(MIN_PERIOD)
}
