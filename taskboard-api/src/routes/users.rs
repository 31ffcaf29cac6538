use crate::{app::AppState, error::ApiResult, response::Success};
use axum::{extract::State, Extension};
use taskboard_shared::auth::context::AuthContext;
use taskboard_shared::models::user::User;
use taskboard_shared::services::users;

/// `GET /getallusers`, Admin and above
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Success<Vec<User>>> {
    let users = users::list_users(&state.repos, &auth).await?;
    Ok(Success::ok("User list retrieved successfully", users))
}
