//! Reseller Shield - caching proxy in front of the landing-page origin
//!
//! Runs the cache worker as an HTTP proxy with the health poller, breaker
//! sweep and TTL cleanup in the background.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reseller_shield::api::create_router;
use reseller_shield::clock::SystemClock;
use reseller_shield::{
    spawn_cleanup_task, spawn_health_poller, spawn_sweep_task, AppState, Config,
};

/// Main entry point for the proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Wire cache, breaker, fetcher, health monitor and worker
/// 4. Install and activate the cache worker
/// 5. Start background tasks and preload landing-page sections
/// 6. Serve until SIGINT/SIGTERM, then abort background tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reseller_shield=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reseller Shield");

    let config = Config::from_env();
    info!(
        "Configuration loaded: origin={}, port={}, default_ttl={}s, cache_file={:?}",
        config.origin_url, config.server_port, config.default_ttl, config.cache_file
    );

    let state = AppState::from_config(&config, SystemClock::shared())?;
    state.worker.install().await;

    let mut handles = vec![
        spawn_cleanup_task(
            state.facade.cache().clone(),
            Duration::from_secs(config.cleanup_interval),
        ),
        spawn_sweep_task(
            state.facade.breaker().clone(),
            state.facade.breaker().config().sweep_interval,
        ),
        spawn_health_poller(
            state.health.clone(),
            Duration::from_secs(config.health_poll_interval),
        ),
    ];
    info!("Background tasks started");

    let facade = state.facade.clone();
    let targets = state.section_targets(&config.preload_sections);
    handles.push(tokio::spawn(async move {
        facade.preload(&targets).await;
    }));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(handles))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then aborts the background tasks.
async fn shutdown_signal(handles: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in &handles {
        handle.abort();
    }
    warn!("{} background tasks aborted", handles.len());
}
