//! # Taskboard API Server
//!
//! HTTP API for users, projects and tasks behind role-based access control.
//! Unless `SCANNER_ENABLED=false`, the overdue scanner runs in the same
//! process and is stopped during graceful shutdown.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p taskboard-api
//! ```

use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::services::users::bootstrap_admin;
use taskboard_worker::alerts::TracingAlertSink;
use taskboard_worker::scanner::OverdueScanner;

const DEFAULT_LOG_FILTER: &str = "taskboard_api=debug,taskboard_worker=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.json_logs);

    tracing::info!("Taskboard API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = config.store.connect().await?;
    let state = AppState::new(store, config);

    if let Some(admin) = &state.config.bootstrap_admin {
        if bootstrap_admin(&state.repos, &admin.email, &admin.name).await?.is_none() {
            tracing::debug!("Users already present, skipping bootstrap admin");
        }
    }

    let shutdown = CancellationToken::new();
    let scanner = if state.config.scanner.enabled {
        let scanner = OverdueScanner::new(
            state.repos.tasks.clone(),
            Arc::new(TracingAlertSink),
            state.config.scanner.config,
        )
        .with_shutdown(shutdown.child_token());
        Some(scanner.spawn())
    } else {
        tracing::info!("Overdue scanner disabled");
        None
    };

    let address = state.config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, shutting down background tasks...");
    shutdown.cancel();
    if let Some(handle) = scanner {
        handle.await?;
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
