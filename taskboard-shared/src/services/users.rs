//! User operations: login, signup, listing and bootstrap

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use super::{decode_all, pipelines};
use crate::auth::authorization::{require_assignable_role, Action};
use crate::auth::context::AuthContext;
use crate::auth::jwt::{create_token, Claims};
use crate::error::{ServiceError, ServiceResult};
use crate::models::user::{LoginRequest, NewUser, Role, User};
use crate::models::{from_document, to_document};
use crate::store::filter::Filter;
use crate::store::repository::Repositories;

/// Issued credentials
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub role: Role,
    pub id: String,
}

/// Looks up a user by email
pub async fn find_by_email(repos: &Repositories, email: &str) -> ServiceResult<Option<User>> {
    let mut cursor = repos.users.find(&Filter::eq("email", email)).await?;
    cursor
        .next()
        .map(from_document::<User>)
        .transpose()
        .map_err(ServiceError::from)
}

/// Issues a token for the user registered under `request.email`
pub async fn login(
    repos: &Repositories,
    request: LoginRequest,
    secret: &str,
    expiration: chrono::Duration,
) -> ServiceResult<Session> {
    request
        .validate()
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;

    let user = find_by_email(repos, &request.email)
        .await?
        .ok_or_else(|| ServiceError::unauthorized("User not found. Please signup first."))?;

    let claims = Claims::with_expiration(user.id.clone(), user.role, expiration);
    let token = create_token(&claims, secret)
        .map_err(|e| ServiceError::Store(format!("token signing failed: {e}")))?;

    info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Session {
        token,
        role: user.role,
        id: user.id,
    })
}

/// Registers a user; callers may not grant a role above their own
pub async fn signup(repos: &Repositories, auth: &AuthContext, new_user: NewUser) -> ServiceResult<User> {
    Action::CreateUser.scope_for(auth.role)?;
    require_assignable_role(auth, new_user.role)?;
    new_user
        .validate()
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;

    let mut user = new_user.into_user(Utc::now());
    let id = repos.users.insert_one(to_document(&user)?).await?;
    user.id = id.public_id();

    info!(user_id = %user.id, role = %user.role, created_by = %auth.user_id, "User created");
    Ok(user)
}

/// Every user, for Admin and above
pub async fn list_users(repos: &Repositories, auth: &AuthContext) -> ServiceResult<Vec<User>> {
    Action::ListUsers.scope_for(auth.role)?;

    let cursor = repos.users.aggregate(&pipelines::public_listing(Filter::All)).await?;
    decode_all(cursor)
}

/// Seeds a Super Admin when no users exist yet
///
/// Returns the created user, or `None` if the collection already had users.
pub async fn bootstrap_admin(repos: &Repositories, email: &str, name: &str) -> ServiceResult<Option<User>> {
    if repos.users.count(&Filter::All).await? > 0 {
        return Ok(None);
    }

    let new_user = NewUser {
        id: None,
        name: name.to_string(),
        email: email.to_string(),
        role: Role::SuperAdmin,
    };
    new_user
        .validate()
        .map_err(|e| ServiceError::bad_input(format!("bootstrap admin: {e}")))?;

    let mut user = new_user.into_user(Utc::now());
    match repos.users.insert_one(to_document(&user)?).await {
        Ok(id) => {
            user.id = id.public_id();
            info!(user_id = %user.id, email = %user.email, "Bootstrap Super Admin created");
            Ok(Some(user))
        }
        Err(crate::store::StoreError::DuplicateKey { .. }) => {
            warn!(email, "Bootstrap admin already exists");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
