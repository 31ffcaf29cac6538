/// Tasks
///
/// # Stored shape
///
/// ```json
/// {
///   "_id": "0001",
///   "title": "Fix bug",
///   "description": "",
///   "status": "In Progress",
///   "priority": "High",
///   "duedate": "2024-06-01T12:00:00Z",
///   "projectid": "p1",
///   "assignedto": "u1",
///   "createdat": "...",
///   "updatedat": "..."
/// }
/// ```
///
/// `assignedto` is the one field used for assignment, both when filtering
/// and when reassigning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

pub mod fields {
    pub const TITLE: &str = "title";
    pub const STATUS: &str = "status";
    pub const DUE_DATE: &str = "duedate";
    pub const PROJECT_ID: &str = "projectid";
    pub const ASSIGNED_TO: &str = "assignedto";
    pub const UPDATED_AT: &str = "updatedat";
}

/// Task workflow state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Todo,

    #[serde(rename = "In Progress")]
    InProgress,

    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a status outside the workflow
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status {0:?}, expected one of \"Todo\", \"In Progress\", \"Done\"")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: String,

    #[serde(rename = "duedate", default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(rename = "projectid", default)]
    pub project_id: String,

    #[serde(rename = "assignedto", default)]
    pub assigned_to: String,

    #[serde(rename = "createdat", default)]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedat", default)]
    pub updated_at: DateTime<Utc>,
}

/// Task creation payload
///
/// `status` is free text here so that an empty value can fall back to
/// "Todo" and an unknown one can be reported as bad input.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTask {
    #[serde(default)]
    pub id: Option<String>,

    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub priority: String,

    #[serde(rename = "duedate", default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(rename = "projectid", default)]
    pub project_id: String,

    #[serde(rename = "assignedto", default)]
    pub assigned_to: String,
}

impl NewTask {
    /// Builds the stored task, defaulting the status and stamping timestamps
    pub fn into_task(self, now: DateTime<Utc>) -> Result<Task, UnknownStatus> {
        let status = match self.status.as_deref() {
            None | Some("") => TaskStatus::default(),
            Some(s) => s.parse()?,
        };

        Ok(Task {
            id: self.id.unwrap_or_default(),
            title: self.title,
            description: self.description,
            status,
            priority: self.priority,
            due_date: self.due_date,
            project_id: self.project_id,
            assigned_to: self.assigned_to,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Status change payload
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub id: String,
    pub status: String,
}

/// Reassignment payload
#[derive(Debug, Clone, Deserialize)]
pub struct Reassignment {
    pub id: String,

    #[serde(rename = "assignedto")]
    pub assigned_to: String,
}
