/// Task endpoints
///
/// - `POST /task/create` - any role; status defaults to "Todo"
/// - `GET /tasks?projectId=` - a project's tasks; Users only see their own
/// - `GET /task/search?title=` - case-insensitive title search, scoped the same way
/// - `POST /task/update` - change status
/// - `POST /taskOwnerUpdate` - reassign
/// - `DELETE /task/delete?id=` - Admin and above
///
/// Mutations accept either a plain string id or a 24 hex digit object id.
/// Users may only mutate tasks assigned to them; anything else is reported
/// as not found.

use crate::{app::AppState, error::ApiResult, response::Success};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use taskboard_shared::auth::context::AuthContext;
use taskboard_shared::models::task::{NewTask, Reassignment, StatusUpdate, Task};
use taskboard_shared::services::tasks;
use taskboard_shared::store::identifier::CandidateKind;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    #[serde(rename = "projectId")]
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

/// Which task a mutation touched and how its id was matched
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMutation {
    pub id: String,
    pub matched_by: &'static str,
}

impl TaskMutation {
    fn new(id: String, kind: CandidateKind) -> Self {
        Self {
            id,
            matched_by: kind.as_str(),
        }
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> ApiResult<Success<Task>> {
    let Json(new_task) = payload?;
    new_task.validate()?;

    let task = tasks::create_task(&state.repos, &auth, new_task).await?;
    Ok(Success::created("Task created", task))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<ProjectQuery>, QueryRejection>,
) -> ApiResult<Success<Vec<Task>>> {
    let Query(query) = query?;

    let tasks = tasks::list_by_project(&state.repos, &auth, query.project_id.as_deref()).await?;
    Ok(Success::ok("Tasks retrieved successfully", tasks))
}

pub async fn search_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> ApiResult<Success<Vec<Task>>> {
    let Query(query) = query?;

    let tasks = tasks::search(&state.repos, &auth, query.title.as_deref()).await?;
    Ok(Success::ok("Tasks retrieved successfully", tasks))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Success<TaskMutation>> {
    let Json(request) = payload?;
    let id = request.id.clone();

    let kind = tasks::update_status(&state.repos, &auth, request).await?;
    Ok(Success::ok("Task updated successfully", TaskMutation::new(id, kind)))
}

pub async fn reassign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<Reassignment>, JsonRejection>,
) -> ApiResult<Success<TaskMutation>> {
    let Json(request) = payload?;
    let id = request.id.clone();

    let kind = tasks::reassign(&state.repos, &auth, request).await?;
    Ok(Success::ok("Task updated successfully", TaskMutation::new(id, kind)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> ApiResult<Success<TaskMutation>> {
    let Query(query) = query?;

    let kind = tasks::delete(&state.repos, &auth, query.id.as_deref()).await?;
    let id = query.id.unwrap_or_default();
    Ok(Success::ok(format!("Deleted {id}"), TaskMutation::new(id, kind)))
}
