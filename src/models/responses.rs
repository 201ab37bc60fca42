//! Response DTOs for the diagnostics endpoints

use serde::Serialize;

use crate::breaker::CircuitStats;
use crate::cache::CacheStats;
use crate::health::HealthStatus;
use crate::worker::CacheSize;

/// Response body for the proxy's own liveness (GET /__shield/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the proxy answers
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Worker lifecycle and cache sizes.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub active: bool,
    pub caches: Vec<CacheSize>,
}

/// Response body for GET /__shield/status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    /// Cached backend verdict, never probed by this request
    pub backend: HealthStatus,
    pub circuits: Vec<CircuitStats>,
    pub cache: CacheStats,
    /// Hits over lookups, zero before the first lookup
    pub cache_hit_rate: f64,
    pub worker: WorkerStatus,
    pub timestamp: String,
}

impl StatusResponse {
    pub fn new(
        backend: HealthStatus,
        circuits: Vec<CircuitStats>,
        cache: CacheStats,
        worker: WorkerStatus,
    ) -> Self {
        Self {
            backend,
            circuits,
            cache_hit_rate: cache.hit_rate(),
            cache,
            worker,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for POST /__shield/health/check
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResponse {
    pub healthy: bool,
    pub backend: HealthStatus,
}
