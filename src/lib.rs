//! pdfcraft: one-shot PDF and image transformations over HTTP.
//!
//! A request names an operation and uploads its inputs. The
//! [`Dispatcher`](dispatch::Dispatcher) validates it against the
//! [`OperationRegistry`](ops::OperationRegistry), stages the uploads,
//! runs the transformation on the blocking pool and keeps the result for
//! re-download until the retention window elapses. A background
//! [`Sweeper`](sweeper::Sweeper) deletes whatever has expired.

pub mod cli;
pub mod config;
pub mod dispatch;
mod error;
pub use error::*;
pub mod io;
pub mod ops;
pub mod server;
pub mod storage;
pub mod sweeper;
pub(crate) mod utils;

use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::server::AppState;
use crate::storage::{FilesystemStorage, Storage};
use crate::sweeper::Sweeper;

/// Package name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open storage, start the sweeper and serve until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let storage = FilesystemStorage::open(&config.storage, config.retention)
        .await
        .context("Failed to initialize storage")?;
    let storage: Arc<dyn Storage> = Arc::new(storage);
    info!(
        staging = %config.storage.staging_dir.display(),
        results = %config.storage.results_dir.display(),
        retention_minutes = config.retention.window().as_secs() / 60,
        "Storage initialized"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Sweeper::new(storage.clone(), config.sweep_interval).spawn(shutdown_rx);

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, version = VERSION, "{NAME} listening");

    let app = server::router(AppState::new(storage, config));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The sweeper may already be gone if every receiver was dropped.
    let _ = shutdown_tx.send(true);
    sweeper.await.context("Sweeper task panicked")?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
