/// Health check endpoint
///
/// Reports whether the server is running and the document store answers.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "Success",
///   "desc": "Service healthy",
///   "data": { "status": "healthy", "version": "0.1.0", "store": "memory", "storeStatus": "connected" }
/// }
/// ```

use crate::{app::AppState, response::Success};
use axum::extract::State;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Store backend name
    pub store: String,

    /// Store reachability
    pub store_status: String,
}

pub async fn health_check(State(state): State<AppState>) -> Success<HealthResponse> {
    let (status, store_status) = match state.store.ping().await {
        Ok(()) => ("healthy", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            ("degraded", "disconnected")
        }
    };

    Success::ok(
        format!("Service {status}"),
        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store.backend().to_string(),
            store_status: store_status.to_string(),
        },
    )
}
