use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{duration_ms, SharedClock};
use crate::fetch::{FetchRequest, ResilientFetcher};

// == Health Config ==
/// Probe targets and timing.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub liveness_url: String,
    pub diagnostic_url: String,
    /// How long a healthy verdict is trusted.
    pub healthy_ttl: Duration,
    /// How long an unhealthy verdict is trusted.
    pub unhealthy_ttl: Duration,
    pub probe_timeout: Duration,
    pub diagnostic_timeout: Duration,
}

impl HealthConfig {
    /// Default timings against `origin` joined with the two paths.
    pub fn for_origin(origin: &str, liveness_path: &str, diagnostic_path: &str) -> Self {
        let base = origin.trim_end_matches('/');
        Self {
            liveness_url: format!("{}{}", base, liveness_path),
            diagnostic_url: format!("{}{}", base, diagnostic_path),
            healthy_ttl: Duration::from_secs(30),
            unhealthy_ttl: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(8),
            diagnostic_timeout: Duration::from_secs(5),
        }
    }
}

// == Health Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

/// Last verdict and when it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,
    /// Unix milliseconds, zero before the first probe.
    pub last_check_time: u64,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: HealthState::Unknown,
            last_check_time: 0,
        }
    }
}

// == Health Monitor ==
/// Cached view of backend reachability. Cloning shares the cached verdict.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    config: Arc<HealthConfig>,
    fetcher: ResilientFetcher,
    clock: SharedClock,
    state: Arc<RwLock<HealthStatus>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig, fetcher: ResilientFetcher, clock: SharedClock) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            clock,
            state: Arc::new(RwLock::new(HealthStatus::default())),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Whether the backend is reachable.
    ///
    /// Answers from the cached verdict while it is fresh, otherwise probes.
    pub async fn check_health(&self) -> bool {
        let now = self.clock.now_ms();
        {
            let state = self.state.read().await;
            let age = now.saturating_sub(state.last_check_time);
            match state.status {
                HealthState::Healthy if age < duration_ms(self.config.healthy_ttl) => return true,
                HealthState::Unhealthy if age < duration_ms(self.config.unhealthy_ttl) => {
                    return false
                }
                _ => {}
            }
        }

        let healthy = self.probe().await;
        self.record(healthy).await;
        healthy
    }

    /// Cached verdict, without probing.
    pub async fn get_status(&self) -> HealthStatus {
        self.state.read().await.clone()
    }

    /// Forgets the cached verdict.
    pub async fn reset(&self) {
        *self.state.write().await = HealthStatus::default();
    }

    /// Probes now regardless of the cached verdict.
    pub async fn force_check(&self) -> bool {
        self.reset().await;
        self.check_health().await
    }

    async fn probe(&self) -> bool {
        let liveness = FetchRequest::get(&self.config.liveness_url);
        match self.fetcher.try_fetch(&liveness, self.config.probe_timeout).await {
            Ok(response) if response.ok() => return true,
            Ok(response) => debug!(
                "Liveness probe returned {}, trying diagnostic endpoint",
                response.status
            ),
            Err(e) => debug!("Liveness probe failed: {}, trying diagnostic endpoint", e),
        }

        let diagnostic = FetchRequest::get(&self.config.diagnostic_url);
        match self
            .fetcher
            .try_fetch(&diagnostic, self.config.diagnostic_timeout)
            .await
        {
            Ok(response) => response.ok(),
            Err(e) => {
                debug!("Diagnostic probe failed: {}", e);
                false
            }
        }
    }

    async fn record(&self, healthy: bool) {
        let verdict = if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };

        let mut state = self.state.write().await;
        if state.status != verdict {
            match verdict {
                HealthState::Healthy => info!("Backend is healthy"),
                _ => warn!("Backend is unreachable"),
            }
        }
        *state = HealthStatus {
            status: verdict,
            last_check_time: self.clock.now_ms(),
        };
    }
}
