use crate::{app::AppState, error::ApiResult, response::Success};
use axum::{extract::State, Extension};
use taskboard_shared::auth::context::AuthContext;
use taskboard_shared::services::overview::{self, Everything};

/// `GET /everything`
///
/// Admin and above. A collection that cannot be read comes back empty
/// instead of failing the request.
pub async fn everything(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Success<Everything>> {
    let content = overview::everything(&state.repos, &auth).await?;
    Ok(Success::ok("All system data retrieved successfully", content))
}
