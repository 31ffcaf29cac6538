/// Per-request identity
///
/// Built from validated token claims at request entry and dropped when the
/// request completes. Nothing about it is persisted.

use serde::{Deserialize, Serialize};

use super::jwt::Claims;
use crate::models::user::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Caller identifier
    pub user_id: String,

    /// Caller role
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            role: claims.role,
        }
    }
}
