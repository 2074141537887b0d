//! Devmart cache diagnostics service
//!
//! Serves the cache layer over HTTP so its statistics can be inspected and
//! invalidations triggered by hand.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use devmart_cache::api::create_router;
use devmart_cache::{AppContext, Config, MemoryExecutor};

/// Main entry point for the diagnostics service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Seed the in-memory executor from `DATA_FILE`, if set
/// 4. Build the cache context and start its background sweeps
/// 5. Warm the homepage and settings composites
/// 6. Serve HTTP until SIGINT/SIGTERM, then dispose the context
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devmart_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Devmart cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_size={}B, max_entries={}, default_ttl={}s, port={}, cleanup_interval={}s",
        config.max_size,
        config.max_entries,
        config.default_ttl,
        config.server_port,
        config.cleanup_interval
    );

    let executor = load_executor(config.data_file.as_deref())?;

    let mut context = AppContext::init(&config, Arc::new(executor));
    context.warm().await;

    let app = create_router(context.state());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    context.dispose();
    info!("Server shutdown complete");
    Ok(())
}

/// Builds the in-memory executor, seeded from `data_file` when one is given.
fn load_executor(data_file: Option<&Path>) -> anyhow::Result<MemoryExecutor> {
    let Some(path) = data_file else {
        warn!("DATA_FILE not set, serving an empty store");
        return Ok(MemoryExecutor::new());
    };
    let executor = MemoryExecutor::from_json_file(path)
        .map_err(|err| anyhow::anyhow!(err))
        .with_context(|| format!("loading seed data from {}", path.display()))?;
    info!(
        collections = ?executor.collection_names(),
        "Seed data loaded from {}",
        path.display()
    );
    Ok(executor)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
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
                warn!(error = %err, "Failed to install SIGTERM handler");
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_executor_from_seed_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/seed.json");
        let executor = load_executor(Some(&path)).unwrap();
        assert!(executor
            .collection_names()
            .iter()
            .any(|name| name == "services"));
    }

    #[test]
    fn test_load_executor_reports_missing_file() {
        let err = load_executor(Some(Path::new("does/not/exist.json"))).unwrap_err();
        assert!(err.to_string().contains("loading seed data from"));
    }

    #[test]
    fn test_load_executor_without_file_is_empty() {
        let executor = load_executor(None).unwrap();
        assert!(executor.collection_names().is_empty());
    }
}
