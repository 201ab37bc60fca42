//! Health Poller Task
//!
//! Keeps the health verdict warm so diagnostics never wait on a probe.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::health::HealthMonitor;

/// Spawns a task that calls [`HealthMonitor::check_health`] every `interval`.
///
/// The first check runs immediately. A fresh healthy verdict is reused, so
/// the origin is only probed when the verdict is stale or unhealthy.
pub fn spawn_health_poller(monitor: HealthMonitor, interval: Duration) -> JoinHandle<()> {
    let interval = super::clamp_period(interval);
    tokio::spawn(async move {
        info!("Starting health poller with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let healthy = monitor.check_health().await;
            debug!("Health poll: backend healthy = {}", healthy);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fetch::scripted::ScriptedTransport;
    use crate::fetch::{ResilientFetcher, Transport};
    use crate::health::{HealthConfig, HealthState};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_poller_probes_once_while_fresh() {
        let transport = Arc::new(ScriptedTransport::new("scripted"));
        transport.respond_json("http://origin/api/health", json!({"status": "ok"}));
        let fetcher = ResilientFetcher::new(
            vec![transport.clone() as Arc<dyn Transport>],
            Duration::from_secs(10),
        );
        let monitor = HealthMonitor::new(
            HealthConfig::for_origin("http://origin", "/api/health", "/api/test"),
            fetcher,
            ManualClock::new(1_000_000),
        );

        let handle = spawn_health_poller(monitor.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(monitor.get_status().await.status, HealthState::Healthy);
        assert_eq!(transport.calls("http://origin/api/health"), 1);
    }

    #[tokio::test]
    async fn test_poller_survives_zero_interval() {
        let transport = Arc::new(ScriptedTransport::new("scripted"));
        transport.respond_json("http://origin/api/health", json!({"status": "ok"}));
        let fetcher = ResilientFetcher::new(
            vec![transport.clone() as Arc<dyn Transport>],
            Duration::from_secs(10),
        );
        let monitor = HealthMonitor::new(
            HealthConfig::for_origin("http://origin", "/api/health", "/api/test"),
            fetcher,
            ManualClock::new(1_000_000),
        );

        let handle = spawn_health_poller(monitor.clone(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!handle.is_finished(), "poller should still be running");
        assert_eq!(monitor.get_status().await.status, HealthState::Healthy);
        assert!(transport.calls("http://origin/api/health") >= 1);
        handle.abort();
    }
}
