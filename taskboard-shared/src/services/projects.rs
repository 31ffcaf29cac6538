//! Project operations

use chrono::Utc;
use tracing::info;
use validator::Validate;

use super::{decode_all, pipelines};
use crate::auth::authorization::{build_filter, Action};
use crate::auth::context::AuthContext;
use crate::error::{ServiceError, ServiceResult};
use crate::models::project::{NewProject, Project, ProjectDetail};
use crate::models::to_document;
use crate::store::filter::Filter;
use crate::store::repository::Repositories;

/// Creates a project; the owner defaults to the caller
pub async fn create_project(
    repos: &Repositories,
    auth: &AuthContext,
    new_project: NewProject,
) -> ServiceResult<Project> {
    Action::CreateProject.scope_for(auth.role)?;
    new_project
        .validate()
        .map_err(|e| ServiceError::bad_input(e.to_string()))?;

    let mut project = new_project.into_project(&auth.user_id, Utc::now());
    let id = repos.projects.insert_one(to_document(&project)?).await?;
    project.id = id.public_id();

    info!(project_id = %project.id, owner_id = %project.owner_id, "Project created");
    Ok(project)
}

/// Projects visible to the caller, with members expanded
pub async fn list_projects(repos: &Repositories, auth: &AuthContext) -> ServiceResult<Vec<ProjectDetail>> {
    let filter = build_filter(Filter::All, auth, Action::ListProjects)?;

    let cursor = repos
        .projects
        .aggregate(&pipelines::project_details(filter))
        .await?;
    decode_all(cursor)
}
