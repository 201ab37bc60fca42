//! Breaker Sweep Task
//!
//! Periodically drops circuit records that have been idle too long.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::breaker::CircuitBreaker;

/// Spawns a task that sweeps idle circuits every `interval`.
pub fn spawn_sweep_task(breaker: CircuitBreaker, interval: Duration) -> JoinHandle<()> {
    let interval = super::clamp_period(interval);
    tokio::spawn(async move {
        info!("Starting breaker sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = breaker.sweep().await;
            if removed > 0 {
                info!("Breaker sweep: dropped {} idle circuits", removed);
            } else {
                debug!("Breaker sweep: nothing idle");
            }
        }
    })
}
