/// Authentication endpoints
///
/// - `POST /login` - exchange a registered email for a token
/// - `POST /signup` - register a user (Admin and above; the new role may not
///   exceed the caller's)

use crate::{
    app::AppState,
    error::ApiResult,
    response::Success,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use taskboard_shared::auth::context::AuthContext;
use taskboard_shared::models::user::{LoginRequest, NewUser, User};
use taskboard_shared::services::users::{self, Session};
use validator::Validate;

/// Login
///
/// # Endpoint
///
/// ```text
/// POST /login
/// Content-Type: application/json
///
/// { "email": "ada@example.com" }
/// ```
///
/// # Response
///
/// ```json
/// { "status": "Success", "desc": "Authentication successful",
///   "data": { "token": "eyJ...", "role": "Admin", "id": "0001" } }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: malformed body or email
/// - `401 Unauthorized`: no user with that email
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Success<Session>> {
    let Json(request) = payload?;
    request.validate()?;

    let session = users::login(&state.repos, request, state.jwt_secret(), state.config.token_lifetime()).await?;
    Ok(Success::ok("Authentication successful", session))
}

/// Signup
///
/// # Errors
///
/// - `403 Forbidden`: caller below Admin, or requesting a higher role
/// - `400 Bad Request`: invalid name or email
/// - `409 Conflict`: email already registered
pub async fn signup(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<Success<User>> {
    let Json(new_user) = payload?;

    let user = users::signup(&state.repos, &auth, new_user).await?;
    Ok(Success::created("Signup successful!", user))
}
