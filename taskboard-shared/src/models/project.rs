/// Projects
///
/// The owner counts as a member for access purposes even when absent from
/// `memberIds`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use validator::Validate;

use super::user::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "ownerId", default)]
    pub owner_id: String,

    #[serde(rename = "memberIds", default)]
    pub member_ids: Vec<String>,

    #[serde(rename = "createdAt", default)]
    pub created_at: DateTime<Utc>,
}

/// A project with its members expanded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,

    #[serde(default, deserialize_with = "decodable_members")]
    pub members: Vec<User>,
}

/// Joined members, skipping any record that does not decode as a user
fn decodable_members<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<User>, D::Error> {
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|member| match serde_json::from_value::<User>(member) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable project member");
                None
            }
        })
        .collect())
}

/// Project creation payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProject {
    #[serde(default)]
    pub id: Option<String>,

    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Defaults to the caller
    #[serde(rename = "ownerId", default)]
    pub owner_id: Option<String>,

    #[serde(rename = "memberIds", default)]
    pub member_ids: Vec<String>,
}

impl NewProject {
    pub fn into_project(self, caller_id: &str, now: DateTime<Utc>) -> Project {
        let owner_id = self
            .owner_id
            .filter(|owner| !owner.is_empty())
            .unwrap_or_else(|| caller_id.to_string());

        let mut member_ids: Vec<String> = Vec::with_capacity(self.member_ids.len());
        for member in self.member_ids {
            if !member.is_empty() && !member_ids.contains(&member) {
                member_ids.push(member);
            }
        }

        Project {
            id: self.id.unwrap_or_default(),
            name: self.name,
            description: self.description,
            owner_id,
            member_ids,
            created_at: now,
        }
    }
}
