//! API Routes
//!
//! Configures the Axum router for the proxy.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    content_handler, force_check_handler, health_handler, proxy_handler, status_handler,
    AppState,
};

/// Creates the proxy router.
///
/// Diagnostics live under `/__shield`; every other request falls back to the
/// cache worker.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/__shield/health", get(health_handler))
        .route("/__shield/status", get(status_handler))
        .route("/__shield/health/check", post(force_check_handler))
        .route("/__shield/content/:section", get(content_handler))
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
    use crate::cache::TtlCache;
    use crate::client::CachedFetcher;
    use crate::clock::ManualClock;
    use crate::fetch::scripted::ScriptedTransport;
    use crate::fetch::{FetchResponse, ResilientFetcher, Transport};
    use crate::health::{HealthConfig, HealthMonitor};
    use crate::worker::{CacheWorker, Classifier, WorkerConfig};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::util::ServiceExt;

    const ORIGIN: &str = "http://origin.test";

    async fn create_test_app() -> (Router, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new("scripted"));
        let clock = ManualClock::new(1_700_000_000_000);
        let fetcher = ResilientFetcher::new(
            vec![transport.clone() as Arc<dyn Transport>],
            Duration::from_secs(10),
        );
        let origin = url::Url::parse(ORIGIN).unwrap();

        let worker = CacheWorker::new(
            WorkerConfig::default(),
            Classifier::new(&origin, Vec::new()),
            fetcher.clone(),
        );
        worker.install().await;
        let health = HealthMonitor::new(
            HealthConfig::for_origin(ORIGIN, "/api/health", "/api/test"),
            fetcher.clone(),
            clock.clone(),
        );
        let facade = CachedFetcher::new(
            Arc::new(RwLock::new(TtlCache::new(clock.clone()))),
            CircuitBreaker::new(CircuitBreakerConfig::default(), clock),
            fetcher,
        );

        let state = AppState::new(ORIGIN, worker, health, facade, Duration::from_secs(300));
        (create_router(state), transport)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, transport) = create_test_app().await;
        let (status, body) = get(app, "/__shield/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_status_endpoint_does_not_probe() {
        let (app, transport) = create_test_app().await;
        let (status, body) = get(app, "/__shield/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"]["status"], "unknown");
        assert_eq!(body["worker"]["active"], true);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_force_check_endpoint() {
        let (app, transport) = create_test_app().await;
        transport.respond_json("http://origin.test/api/health", json!({"status": "ok"}));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/__shield/health/check")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["healthy"], true);
        assert_eq!(body["backend"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_content_endpoint() {
        let (app, transport) = create_test_app().await;
        transport.respond_json("http://origin.test/api/faq", json!([{"q": "Como revender?"}]));

        let (status, body) = get(app.clone(), "/__shield/content/faq").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["q"], "Como revender?");

        let _ = get(app, "/__shield/content/faq").await;
        assert_eq!(transport.calls("http://origin.test/api/faq"), 1);
    }

    #[tokio::test]
    async fn test_content_unavailable() {
        let (app, _) = create_test_app().await;
        let (status, body) = get(app, "/__shield/content/seo").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("seo"));
    }

    #[tokio::test]
    async fn test_content_invalid_section() {
        let (app, transport) = create_test_app().await;
        let (status, _) = get(app, "/__shield/content/he%20ro").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_proxies_through_worker() {
        let (app, transport) = create_test_app().await;
        transport.respond(
            "http://origin.test/uploads/x.webp",
            Ok(FetchResponse::new(200, "img").with_header("content-type", "image/webp")),
        );

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/uploads/x.webp")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/webp");

        transport.fail("http://origin.test/uploads/x.webp");
        let (status, _) = get(app, "/uploads/x.webp").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transport.calls("http://origin.test/uploads/x.webp"), 1);
    }

    #[tokio::test]
    async fn test_fallback_maps_upstream_failure_to_502() {
        let (app, _) = create_test_app().await;
        let (status, body) = get(app, "/api/hero").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().is_some());
    }
}
