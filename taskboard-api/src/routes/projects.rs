/// Project endpoints
///
/// - `POST /project/create` - any role; the owner defaults to the caller
/// - `GET /getProject` - projects the caller owns or is a member of
///   (every project for Super Admin), with member details

use crate::{app::AppState, error::ApiResult, response::Success};
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use taskboard_shared::auth::context::AuthContext;
use taskboard_shared::models::project::{NewProject, Project, ProjectDetail};
use taskboard_shared::services::projects;
use validator::Validate;

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> ApiResult<Success<Project>> {
    let Json(new_project) = payload?;
    new_project.validate()?;

    let project = projects::create_project(&state.repos, &auth, new_project).await?;
    Ok(Success::created("Project created!", project))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Success<Vec<ProjectDetail>>> {
    let projects = projects::list_projects(&state.repos, &auth).await?;
    Ok(Success::ok("Projects retrieved successfully", projects))
}
