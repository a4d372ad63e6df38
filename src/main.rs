//! Queued Cache - demo server
//!
//! Serves a few demo units over HTTP so the stale-while-revalidate lifecycle
//! can be exercised with curl.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queued_cache::api::create_router;
use queued_cache::cache::{ChannelQueue, MemoryStore, Namespace, QueuedCache};
use queued_cache::demo::register_demo_units;
use queued_cache::{spawn_refresh_worker, AppState, Config};

/// Main entry point for the Queued Cache demo server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the store, refresh queue and cache
/// 4. Register the demo units
/// 5. Start the background refresh worker
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queued_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Queued Cache demo server");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: owner={}, version={}, port={}, guard_timeout={}s, queue_capacity={}",
        config.cache_owner,
        config.cache_version,
        config.server_port,
        config.guard_timeout,
        config.queue_capacity
    );

    // Create cache with its store and refresh queue
    let (queue, receiver) = ChannelQueue::new(config.queue_capacity);
    let cache = QueuedCache::builder(Namespace::new(
        config.cache_owner.clone(),
        config.cache_version.clone(),
    ))
    .store(Arc::new(MemoryStore::new()))
    .queue(Arc::new(queue))
    .guard_timeout(config.guard_timeout())
    .build()
    .context("Failed to build cache")?;

    register_demo_units(&cache, &config).context("Failed to register demo units")?;
    info!("Registered units: {}", cache.units().join(", "));

    // Start background refresh worker
    let worker_handle = spawn_refresh_worker(cache.clone(), receiver);
    info!("Background refresh worker started");

    // Create router with all endpoints
    let app = create_router(AppState::new(cache));

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(worker_handle))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the refresh worker and allows graceful shutdown.
async fn shutdown_signal(worker_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
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

    // Abort the refresh worker
    worker_handle.abort();
    info!("Refresh worker aborted");
}
