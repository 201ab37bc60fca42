//! Circuit breaker registry keyed by endpoint.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::circuit::{Admission, CircuitBreakerConfig, CircuitRecord, CircuitState, Transition};
use crate::clock::SharedClock;

/// Diagnostic view of one endpoint's circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStats {
    pub endpoint: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: u64,
    pub is_open: bool,
}

/// Per-endpoint circuit breaker.
///
/// Records are created on first use and swept once idle. Cloning shares the
/// same records.
///
/// # Example
/// ```no_run
/// use reseller_shield::breaker::{CircuitBreaker, CircuitBreakerConfig};
/// use reseller_shield::clock::SystemClock;
///
/// # async fn demo() {
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::default(), SystemClock::shared());
/// let hero = breaker
///     .execute("/api/hero", || async { Ok::<_, std::io::Error>("hero") })
///     .await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    clock: SharedClock,
    circuits: Arc<Mutex<HashMap<String, CircuitRecord>>>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config: Arc::new(config),
            clock,
            circuits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Runs `op` under the circuit for `endpoint`.
    ///
    /// Returns `Ok(None)` without calling `op` while the circuit is open.
    /// Failures are recorded and then handed back to the caller.
    pub async fn execute<F, Fut, T, E>(&self, endpoint: &str, op: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = {
            let mut circuits = self.circuits.lock().await;
            let record = circuits.entry(endpoint.to_string()).or_default();
            record.admit(self.clock.now_ms(), &self.config)
        };

        match admission {
            Admission::Rejected => {
                debug!("Circuit for {} is OPEN, skipping call", endpoint);
                return Ok(None);
            }
            Admission::Probing => {
                info!("Circuit for {} entering HALF_OPEN", endpoint);
            }
            Admission::Allowed => {}
        }

        // The lock is released while the operation runs
        let outcome = op().await;

        let mut circuits = self.circuits.lock().await;
        let record = circuits.entry(endpoint.to_string()).or_default();
        match outcome {
            Ok(value) => {
                if record.record_success(&self.config) == Some(Transition::Closed) {
                    info!("Circuit for {} recovered to CLOSED", endpoint);
                }
                Ok(Some(value))
            }
            Err(e) => {
                let transition = record.record_failure(self.clock.now_ms(), &self.config);
                match transition {
                    Some(Transition::Opened) => warn!(
                        "Circuit for {} opened after {} failures",
                        endpoint, record.failure_count
                    ),
                    Some(Transition::Reopened) => {
                        warn!("Circuit for {} re-opened during recovery", endpoint)
                    }
                    _ => {}
                }
                Err(e)
            }
        }
    }

    /// Whether calls to `endpoint` are currently short-circuited.
    pub async fn is_open(&self, endpoint: &str) -> bool {
        let circuits = self.circuits.lock().await;
        circuits
            .get(endpoint)
            .map(|record| record.is_open_at(self.clock.now_ms(), &self.config))
            .unwrap_or(false)
    }

    /// Stats for one endpoint, `None` if it is not tracked.
    pub async fn get_stats(&self, endpoint: &str) -> Option<CircuitStats> {
        let circuits = self.circuits.lock().await;
        let now = self.clock.now_ms();
        circuits
            .get(endpoint)
            .map(|record| self.stats_for(endpoint, record, now))
    }

    /// Stats for every tracked endpoint, sorted by endpoint.
    pub async fn all_stats(&self) -> Vec<CircuitStats> {
        let circuits = self.circuits.lock().await;
        let now = self.clock.now_ms();
        let mut stats: Vec<CircuitStats> = circuits
            .iter()
            .map(|(endpoint, record)| self.stats_for(endpoint, record, now))
            .collect();
        stats.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        stats
    }

    /// Forgets an endpoint's record, closing its circuit.
    pub async fn reset(&self, endpoint: &str) -> bool {
        let removed = self.circuits.lock().await.remove(endpoint).is_some();
        if removed {
            info!("Circuit for {} reset", endpoint);
        }
        removed
    }

    /// Drops records idle for more than twice the timeout.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut circuits = self.circuits.lock().await;
        let before = circuits.len();
        circuits.retain(|_, record| !record.is_idle(now, &self.config));
        before - circuits.len()
    }

    /// Number of endpoints currently tracked.
    pub async fn tracked(&self) -> usize {
        self.circuits.lock().await.len()
    }

    fn stats_for(&self, endpoint: &str, record: &CircuitRecord, now: u64) -> CircuitStats {
        CircuitStats {
            endpoint: endpoint.to_string(),
            state: record.state,
            failure_count: record.failure_count,
            success_count: record.success_count,
            last_failure_time: record.last_failure_time,
            is_open: record.is_open_at(now, &self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const START: u64 = 1_700_000_000_000;

    fn breaker() -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = ManualClock::new(START);
        (
            CircuitBreaker::new(CircuitBreakerConfig::default(), clock.clone()),
            clock,
        )
    }

    async fn fail(breaker: &CircuitBreaker, endpoint: &str) -> Result<Option<()>, String> {
        breaker
            .execute(endpoint, || async { Err::<(), _>("boom".to_string()) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, endpoint: &str) -> Result<Option<u8>, String> {
        breaker
            .execute(endpoint, || async { Ok::<_, String>(7) })
            .await
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let (breaker, _) = breaker();
        assert_eq!(succeed(&breaker, "/api/hero").await, Ok(Some(7)));

        let stats = breaker.get_stats("/api/hero").await.unwrap();
        assert_eq!(stats.state, CircuitState::Closed);
        assert!(!stats.is_open);
    }

    #[tokio::test]
    async fn test_failure_is_returned_to_caller() {
        let (breaker, _) = breaker();
        assert_eq!(fail(&breaker, "/api/faq").await, Err("boom".to_string()));
        assert_eq!(
            breaker.get_stats("/api/faq").await.unwrap().failure_count,
            1
        );
    }

    #[tokio::test]
    async fn test_opens_and_short_circuits() {
        let (breaker, clock) = breaker();
        for _ in 0..5 {
            let _ = fail(&breaker, "/api/seo").await;
        }
        assert!(breaker.is_open("/api/seo").await);

        let calls = AtomicUsize::new(0);
        clock.advance(Duration::from_secs(59));
        let result: Result<Option<()>, String> = breaker
            .execute("/api/seo", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Ok(None));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_endpoints_are_independent() {
        let (breaker, _) = breaker();
        for _ in 0..5 {
            let _ = fail(&breaker, "/api/pixels").await;
        }

        assert!(breaker.is_open("/api/pixels").await);
        assert!(!breaker.is_open("/api/hero").await);
        assert_eq!(succeed(&breaker, "/api/hero").await, Ok(Some(7)));
    }

    #[tokio::test]
    async fn test_recovers_through_half_open() {
        let (breaker, clock) = breaker();
        for _ in 0..5 {
            let _ = fail(&breaker, "/api/about").await;
        }

        clock.advance(Duration::from_secs(60));
        assert!(!breaker.is_open("/api/about").await);

        assert_eq!(succeed(&breaker, "/api/about").await, Ok(Some(7)));
        assert_eq!(
            breaker.get_stats("/api/about").await.unwrap().state,
            CircuitState::HalfOpen
        );

        assert_eq!(succeed(&breaker, "/api/about").await, Ok(Some(7)));
        let stats = breaker.get_stats("/api/about").await.unwrap();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failure_count, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let (breaker, clock) = breaker();
        for _ in 0..5 {
            let _ = fail(&breaker, "/api/footer").await;
        }
        clock.advance(Duration::from_secs(61));

        assert!(fail(&breaker, "/api/footer").await.is_err());
        assert!(breaker.is_open("/api/footer").await);
        assert_eq!(succeed(&breaker, "/api/footer").await, Ok(None));
    }

    #[tokio::test]
    async fn test_sweep_removes_idle_records() {
        let (breaker, clock) = breaker();
        let _ = fail(&breaker, "/api/old").await;
        clock.advance(Duration::from_secs(100));
        let _ = fail(&breaker, "/api/recent").await;

        clock.advance(Duration::from_secs(30));
        assert_eq!(breaker.sweep().await, 1);
        assert!(breaker.get_stats("/api/old").await.is_none());
        assert!(breaker.get_stats("/api/recent").await.is_some());
    }

    #[tokio::test]
    async fn test_all_stats_sorted() {
        let (breaker, _) = breaker();
        let _ = succeed(&breaker, "/api/testimonials").await;
        let _ = succeed(&breaker, "/api/faq").await;

        let endpoints: Vec<String> = breaker
            .all_stats()
            .await
            .into_iter()
            .map(|s| s.endpoint)
            .collect();
        assert_eq!(endpoints, vec!["/api/faq", "/api/testimonials"]);
    }

    #[tokio::test]
    async fn test_reset() {
        let (breaker, _) = breaker();
        for _ in 0..5 {
            let _ = fail(&breaker, "/api/hero").await;
        }

        assert!(breaker.reset("/api/hero").await);
        assert!(!breaker.is_open("/api/hero").await);
        assert_eq!(breaker.tracked().await, 0);
    }
}
