//! Full-system dump
//!
//! The three collections are dumped concurrently. A collection whose dump
//! fails, whether on the store or while decoding, is reported as empty and
//! does not affect the others.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use super::{decode_all, pipelines};
use crate::auth::authorization::Action;
use crate::auth::context::AuthContext;
use crate::error::ServiceResult;
use crate::models::project::Project;
use crate::models::task::Task;
use crate::models::user::User;
use crate::store::repository::Repository;
use crate::store::repository::Repositories;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Everything {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
}

/// Every user, project and task, for Admin and above
pub async fn everything(repos: &Repositories, auth: &AuthContext) -> ServiceResult<Everything> {
    Action::ViewEverything.scope_for(auth.role)?;

    let (users, projects, tasks) = futures::join!(
        dump_or_empty::<User>(&repos.users),
        dump_or_empty::<Project>(&repos.projects),
        dump_or_empty::<Task>(&repos.tasks),
    );

    Ok(Everything {
        users,
        projects,
        tasks,
    })
}

async fn dump_or_empty<T: DeserializeOwned>(repo: &Repository) -> Vec<T> {
    let result = match repo.dump(&pipelines::dump()).await {
        Ok(cursor) => decode_all(cursor),
        Err(e) => Err(e.into()),
    };

    result.unwrap_or_else(|e| {
        warn!(collection = %repo.collection(), error = %e, "Dump failed, returning no records");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::models::user::Role;
    use crate::store::memory::MemoryStore;
    use crate::store::repository::Timeouts;
    use crate::store::{Collection, DocumentStore};
    use serde_json::json;
    use std::sync::Arc;

    async fn insert(store: &MemoryStore, collection: Collection, value: serde_json::Value) {
        store
            .insert_one(collection, value.as_object().cloned().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_everything_collects_all_three() {
        let store = Arc::new(MemoryStore::new());
        insert(&store, Collection::Users, json!({"_id": "u1", "email": "a@x.io", "role": "User"})).await;
        insert(&store, Collection::Projects, json!({"_id": "p1", "name": "Alpha"})).await;
        insert(&store, Collection::Tasks, json!({"_id": "t1", "title": "Fix"})).await;

        let repos = Repositories::new(store, Timeouts::default());
        let all = everything(&repos, &AuthContext::new("a", Role::Admin)).await.unwrap();
        assert_eq!(all.users.len(), 1);
        assert_eq!(all.projects[0].id, "p1");
        assert_eq!(all.tasks[0].title, "Fix");
    }

    #[tokio::test]
    async fn test_one_bad_collection_does_not_abort_the_others() {
        let store = Arc::new(MemoryStore::new());
        // Missing email and role: cannot decode as a user
        insert(&store, Collection::Users, json!({"_id": "u1"})).await;
        insert(&store, Collection::Tasks, json!({"_id": "t1", "title": "Fix"})).await;

        let repos = Repositories::new(store, Timeouts::default());
        let all = everything(&repos, &AuthContext::new("a", Role::SuperAdmin)).await.unwrap();
        assert!(all.users.is_empty());
        assert!(all.projects.is_empty());
        assert_eq!(all.tasks.len(), 1);
    }

    #[tokio::test]
    async fn test_users_cannot_dump() {
        let repos = Repositories::new(Arc::new(MemoryStore::new()), Timeouts::default());
        assert!(matches!(
            everything(&repos, &AuthContext::new("u", Role::User)).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
