//! API Handlers
//!
//! The proxy fallback that routes every request through the cache worker,
//! and the `/__shield/*` diagnostics endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    body::{to_bytes, Body},
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::cache::{DurableStore, FileStore, MemoryStore, TtlCache};
use crate::client::{CachedFetcher, PreloadTarget};
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{Result, ShieldError};
use crate::fetch::{FetchRequest, FetchResponse, ResilientFetcher};
use crate::health::{HealthConfig, HealthMonitor};
use crate::models::{HealthCheckResponse, HealthResponse, StatusResponse, WorkerStatus};
use crate::worker::{CacheWorker, Classifier, WorkerConfig};

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Headers that describe a single connection and are not forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "content-length",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Origin base URL without a trailing slash
    pub origin: Arc<str>,
    pub worker: CacheWorker,
    pub health: HealthMonitor,
    pub facade: CachedFetcher,
    /// TTL of section payloads fetched through the facade
    pub content_ttl: Duration,
}

impl AppState {
    pub fn new(
        origin: &str,
        worker: CacheWorker,
        health: HealthMonitor,
        facade: CachedFetcher,
        content_ttl: Duration,
    ) -> Self {
        Self {
            origin: Arc::from(origin.trim_end_matches('/')),
            worker,
            health,
            facade,
            content_ttl,
        }
    }

    /// Wires every component from configuration.
    ///
    /// The worker is built but not installed.
    pub fn from_config(config: &Config, clock: SharedClock) -> anyhow::Result<Self> {
        let origin = Url::parse(&config.origin_url)
            .with_context(|| format!("Invalid ORIGIN_URL '{}'", config.origin_url))?;
        let fetcher = ResilientFetcher::with_default_transports(config.fetch_timeout())
            .context("No usable HTTP transport")?;

        let store: Box<dyn DurableStore> = match &config.cache_file {
            Some(path) => Box::new(FileStore::new(path, Some(config.cache_quota_bytes))),
            None => Box::new(MemoryStore::with_quota(config.cache_quota_bytes)),
        };
        let cache = TtlCache::with_store(store, clock.clone());

        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig {
                sweep_interval: Duration::from_secs(config.breaker_sweep_interval),
                ..Default::default()
            },
            clock.clone(),
        );

        let health = HealthMonitor::new(
            HealthConfig::for_origin(
                &config.origin_url,
                &config.health_path,
                &config.diagnostic_path,
            ),
            fetcher.clone(),
            clock,
        );

        let worker = CacheWorker::new(
            WorkerConfig {
                version: config.cache_version.clone(),
                fetch_timeout: config.fetch_timeout(),
                ..Default::default()
            },
            Classifier::new(&origin, config.image_hosts.clone()),
            fetcher.clone(),
        );

        let facade = CachedFetcher::new(Arc::new(RwLock::new(cache)), breaker, fetcher);

        Ok(Self::new(
            &config.origin_url,
            worker,
            health,
            facade,
            config.default_ttl(),
        ))
    }

    /// Absolute origin URL for a proxied path.
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.origin, path_and_query)
    }

    /// Preload targets for the given landing-page sections.
    pub fn section_targets(&self, sections: &[String]) -> Vec<PreloadTarget> {
        PreloadTarget::sections(&self.origin, sections, self.content_ttl)
    }
}

/// Fallback handler: every non-diagnostics request goes through the worker.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ShieldError::InvalidRequest(format!("Unreadable body: {}", e)))?;

    let mut fetch = FetchRequest::new(parts.method.clone(), state.upstream_url(path_and_query));
    fetch.headers = forwardable_headers(&parts.headers);
    if !body.is_empty() {
        fetch.body = Some(body);
    }

    debug!("Proxying {} {}", fetch.method, fetch.url);
    let response = state.worker.handle(fetch).await?;
    Ok(into_http_response(response))
}

/// Handler for GET /__shield/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /__shield/status
///
/// Reports cached state only; nothing here probes the origin.
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let backend = state.health.get_status().await;
    let circuits = state.facade.breaker().all_stats().await;
    let cache = state.facade.cache().read().await.stats();
    let worker = WorkerStatus {
        active: state.worker.is_active(),
        caches: state.worker.cache_sizes().await,
    };

    Json(StatusResponse::new(backend, circuits, cache, worker))
}

/// Handler for POST /__shield/health/check
pub async fn force_check_handler(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let healthy = state.health.force_check().await;
    Json(HealthCheckResponse {
        healthy,
        backend: state.health.get_status().await,
    })
}

/// Handler for GET /__shield/content/:section
///
/// Section JSON from `/api/<section>` through the cache-aware facade.
pub async fn content_handler(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<Value>> {
    if !is_valid_section(&section) {
        return Err(ShieldError::InvalidRequest(format!(
            "Invalid section name '{}'",
            section
        )));
    }

    let url = state.upstream_url(&format!("/api/{}", section));
    state
        .facade
        .get_json::<Value>(&url, state.content_ttl)
        .await
        .map(Json)
        .ok_or_else(|| ShieldError::Unavailable(format!("Section '{}' is unavailable", section)))
}

fn is_valid_section(section: &str) -> bool {
    !section.is_empty()
        && section
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn forwardable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn into_http_response(response: FetchResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        if !HOP_BY_HOP.contains(&name.to_ascii_lowercase().as_str()) {
            builder = builder.header(name.as_str(), value.as_str());
        }
    }

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| ShieldError::Internal(e.to_string()).into_response())
}
