//! # Taskboard Worker
//!
//! Runs the overdue scanner on its own, against the store configured in the
//! environment. The API server also runs a scanner in-process unless
//! `SCANNER_ENABLED=false`, so this binary is meant for deployments that
//! move the scan out of the API process.
//!
//! ## Usage
//!
//! ```bash
//! STORE_BACKEND=postgres DATABASE_URL=postgresql://localhost/taskboard cargo run -p taskboard-worker
//! ```

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskboard_shared::config::StoreConfig;
use taskboard_shared::store::repository::Repository;
use taskboard_shared::store::Collection;
use taskboard_worker::alerts::TracingAlertSink;
use taskboard_worker::scanner::{OverdueScanner, ScannerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_worker=debug,taskboard_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Taskboard Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let lookup = |key: &str| std::env::var(key).ok();
    let store_config = StoreConfig::from_lookup(lookup)?;
    let scanner_config = ScannerConfig::from_lookup(lookup)?;

    let store = store_config.connect().await?;
    let tasks = Repository::new(store, Collection::Tasks, store_config.timeouts);

    let scanner = OverdueScanner::new(tasks, Arc::new(TracingAlertSink), scanner_config);
    let shutdown = scanner.shutdown_token();
    let handle = scanner.spawn();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping scanner...");

    shutdown.cancel();
    handle.await?;

    Ok(())
}
