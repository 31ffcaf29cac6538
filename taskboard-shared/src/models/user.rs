/// User accounts and roles
///
/// # Stored shape
///
/// ```json
/// {"_id": "u1", "name": "Ada", "email": "ada@example.com", "role": "Admin", "createdAt": "..."}
/// ```
///
/// `email` is unique across users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Privilege level attached to an identity
///
/// Hierarchy: Super Admin > Admin > User. Records without a role are
/// treated as `User`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Sees and changes everything
    #[serde(rename = "Super Admin")]
    SuperAdmin,

    /// Manages users and all tasks; sees projects they own or belong to
    Admin,

    /// Works on tasks assigned to them
    #[default]
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Super Admin",
            Role::Admin => "Admin",
            Role::User => "User",
        }
    }

    /// Numeric level for comparisons
    pub fn permission_level(&self) -> u8 {
        match self {
            Role::SuperAdmin => 3,
            Role::Admin => 2,
            Role::User => 1,
        }
    }

    /// Whether this role is at least as privileged as `required`
    pub fn has_permission(&self, required: Role) -> bool {
        self.permission_level() >= required.permission_level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a role name outside the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub role: Role,

    #[serde(rename = "createdAt", default)]
    pub created_at: DateTime<Utc>,
}

/// Signup payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    /// Caller-chosen identifier; generated when absent
    #[serde(default)]
    pub id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    pub role: Role,
}

impl NewUser {
    /// Builds the stored user, stamping `createdAt`
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: self.id.unwrap_or_default(),
            name: self.name,
            email: self.email,
            role: self.role,
            created_at: now,
        }
    }
}

/// Login payload; identity is established by email alone
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::SuperAdmin.has_permission(Role::Admin));
        assert!(Role::Admin.has_permission(Role::Admin));
        assert!(Role::Admin.has_permission(Role::User));
        assert!(!Role::User.has_permission(Role::Admin));
        assert!(!Role::Admin.has_permission(Role::SuperAdmin));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_value(Role::SuperAdmin).unwrap(), json!("Super Admin"));
        assert_eq!(serde_json::from_value::<Role>(json!("User")).unwrap(), Role::User);
        assert!(serde_json::from_value::<Role>(json!("Owner")).is_err());
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_legacy_user_without_email_or_role_decodes() {
        let user: User = serde_json::from_value(json!({"id": "u9", "name": "Legacy"})).unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_new_user_validation() {
        let user: NewUser = serde_json::from_value(json!({
            "name": "Ada",
            "email": "not-an-email",
            "role": "User",
        }))
        .unwrap();
        assert!(user.validate().is_err());

        let user: NewUser = serde_json::from_value(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "role": "User",
        }))
        .unwrap();
        assert!(user.validate().is_ok());
        assert!(user.into_user(Utc::now()).id.is_empty());
    }
}
