//! Task operations
//!
//! Single-task mutations (status change, reassignment, deletion) go through
//! the identifier fallback in [`super::mutation`] with the caller's scope
//! applied to every candidate.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use validator::Validate;

use super::mutation::{run_fallback, FallbackState};
use super::{decode_all, pipelines};
use crate::auth::authorization::{build_filter, scoped_candidates, Action, ScopedCandidate};
use crate::auth::context::AuthContext;
use crate::error::{ServiceError, ServiceResult};
use crate::models::task::{fields, NewTask, Reassignment, StatusUpdate, Task, TaskStatus};
use crate::models::to_document;
use crate::store::filter::{Filter, Update};
use crate::store::identifier::CandidateKind;
use crate::store::repository::Repositories;

/// Creates a task; status defaults to "Todo"
pub async fn create_task(repos: &Repositories, auth: &AuthContext, new_task: NewTask) -> ServiceResult<Task> {
    Action::CreateTask.scope_for(auth.role)?;
    new_task
        .validate()
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;

    let mut task = new_task
        .into_task(Utc::now())
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;
    let id = repos.tasks.insert_one(to_document(&task)?).await?;
    task.id = id.public_id();

    info!(task_id = %task.id, project_id = %task.project_id, status = %task.status, "Task created");
    Ok(task)
}

/// Tasks of one project visible to the caller
pub async fn list_by_project(
    repos: &Repositories,
    auth: &AuthContext,
    project_id: Option<&str>,
) -> ServiceResult<Vec<Task>> {
    let project_id = required(project_id, "Missing projectId")?;
    let filter = build_filter(Filter::eq(fields::PROJECT_ID, project_id), auth, Action::ListTasks)?;

    let cursor = repos.tasks.aggregate(&pipelines::public_listing(filter)).await?;
    decode_all(cursor)
}

/// Case-insensitive title search, scoped like project task listing
pub async fn search(repos: &Repositories, auth: &AuthContext, title: Option<&str>) -> ServiceResult<Vec<Task>> {
    let title = required(title, "Query parameter 'title' is required")?;

    let pattern = Filter::regex_ci(fields::TITLE, title);
    pattern
        .compile()
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;
    let filter = build_filter(pattern, auth, Action::SearchTasks)?;

    let cursor = repos.tasks.find(&filter).await?;
    decode_all(cursor)
}

/// Sets a task's status
pub async fn update_status(
    repos: &Repositories,
    auth: &AuthContext,
    request: StatusUpdate,
) -> ServiceResult<CandidateKind> {
    let candidates = scoped_candidates(&request.id, auth, Action::MutateTask)?;
    let status = request
        .status
        .parse::<TaskStatus>()
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;

    let update = Update::new()
        .set(fields::STATUS, status.as_str())
        .set(fields::UPDATED_AT, now_value());

    let kind = apply_update(repos, &candidates, &update, &request.id).await?;
    info!(task_id = %request.id, status = %status, matched_by = kind.as_str(), "Task status updated");
    Ok(kind)
}

/// Reassigns a task, writing the canonical `assignedto` field
pub async fn reassign(
    repos: &Repositories,
    auth: &AuthContext,
    request: Reassignment,
) -> ServiceResult<CandidateKind> {
    let candidates = scoped_candidates(&request.id, auth, Action::MutateTask)?;
    let assignee = required(Some(request.assigned_to.as_str()), "Missing assignedto")?;

    let update = Update::new()
        .set(fields::ASSIGNED_TO, assignee)
        .set(fields::UPDATED_AT, now_value());

    let kind = apply_update(repos, &candidates, &update, &request.id).await?;
    info!(task_id = %request.id, assigned_to = %assignee, matched_by = kind.as_str(), "Task reassigned");
    Ok(kind)
}

/// Deletes a task; denied to the User role before any store call
pub async fn delete(repos: &Repositories, auth: &AuthContext, id: Option<&str>) -> ServiceResult<CandidateKind> {
    let candidates = scoped_candidates(id.unwrap_or_default(), auth, Action::DeleteTask)?;
    let id = required(id, "Missing id")?;

    let tasks = &repos.tasks;
    let state = run_fallback(&candidates, |filter| async move { tasks.delete_one(&filter).await }).await?;

    let kind = found(state, id)?;
    info!(task_id = %id, matched_by = kind.as_str(), deleted_by = %auth.user_id, "Task deleted");
    Ok(kind)
}

async fn apply_update(
    repos: &Repositories,
    candidates: &[ScopedCandidate],
    update: &Update,
    id: &str,
) -> ServiceResult<CandidateKind> {
    let tasks = &repos.tasks;
    let state = run_fallback(candidates, |filter| async move {
        tasks.update_one(&filter, update).await.map(|outcome| outcome.matched)
    })
    .await?;

    found(state, id)
}

fn found(state: FallbackState, id: &str) -> ServiceResult<CandidateKind> {
    state.matched().ok_or_else(|| {
        debug!(task_id = %id, "No task matched any candidate");
        ServiceError::not_found(format!("Task not found: no task with id {id} is visible to you"))
    })
}

fn required<'a>(value: Option<&'a str>, message: &str) -> ServiceResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::bad_input(message)),
    }
}

fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339())
}
