/// Common test utilities for integration tests
///
/// Builds the full router over a fresh in-memory store, seeded with one
/// user per role, and drives it with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use taskboard_api::app::{build_router, AppState};
use taskboard_api::config::Config;
use taskboard_shared::auth::jwt::{create_token, Claims};
use taskboard_shared::models::user::Role;
use taskboard_shared::store::memory::MemoryStore;
use taskboard_shared::store::{Collection, DocumentStore};

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test context containing the router and the store behind it
pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
}

impl TestContext {
    /// Router over a store holding `root` (Super Admin), `admin` (Admin),
    /// `u1` and `u2` (User)
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        for (id, name, email, role) in [
            ("root", "Root", "root@example.com", "Super Admin"),
            ("admin", "Grace", "grace@example.com", "Admin"),
            ("u1", "Ada", "ada@example.com", "User"),
            ("u2", "Linus", "linus@example.com", "User"),
        ] {
            store
                .insert_one(
                    Collection::Users,
                    doc(json!({"_id": id, "name": name, "email": email, "role": role})),
                )
                .await
                .unwrap();
        }

        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        let app = build_router(AppState::new(store.clone(), config));

        TestContext { app, store }
    }

    /// Sends a request, returning the status and decoded body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    pub async fn insert_task(&self, task: Value) {
        self.store.insert_one(Collection::Tasks, doc(task)).await.unwrap();
    }

    pub async fn task(&self, id: &str) -> Option<Value> {
        let filter = taskboard_shared::store::filter::Filter::eq("_id", id);
        self.store
            .find(Collection::Tasks, &filter)
            .await
            .unwrap()
            .next()
            .map(Value::Object)
    }
}

/// Token for `user_id` with `role`
pub fn token(user_id: &str, role: Role) -> String {
    create_token(&Claims::new(user_id, role), SECRET).unwrap()
}

pub fn doc(value: Value) -> taskboard_shared::store::Document {
    value.as_object().cloned().unwrap()
}
