/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use taskboard_api::{app::{build_router, AppState}, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = config.store.connect().await?;
/// let app = build_router(AppState::new(store, config));
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, routes};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, Uri},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use taskboard_shared::auth::{context::AuthContext, jwt};
use taskboard_shared::store::repository::Repositories;
use taskboard_shared::store::DocumentStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Collection handles with their time budgets
    pub repos: Repositories,

    /// The store behind `repos`, for health checks
    pub store: Arc<dyn DocumentStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            repos: Repositories::new(store.clone(), config.store.timeouts),
            store,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// GET    /health              public
/// POST   /login               public
/// POST   /signup              Admin and above
/// GET    /getallusers         Admin and above
/// POST   /project/create
/// GET    /getProject
/// POST   /task/create
/// GET    /tasks?projectId=
/// GET    /task/search?title=
/// POST   /task/update
/// POST   /taskOwnerUpdate
/// DELETE /task/delete?id=     Admin and above
/// GET    /everything          Admin and above
/// ```
///
/// Anything else answers 404 "Invalid endpoint: <path>".
///
/// # Middleware Stack
///
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. JWT authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/login", post(routes::auth::login));

    let protected_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/getallusers", get(routes::users::list_users))
        .route("/project/create", post(routes::projects::create_project))
        .route("/getProject", get(routes::projects::list_projects))
        .route("/task/create", post(routes::tasks::create_task))
        .route("/tasks", get(routes::tasks::list_tasks))
        .route("/task/search", get(routes::tasks::search_tasks))
        .route("/task/update", post(routes::tasks::update_status))
        .route("/taskOwnerUpdate", post(routes::tasks::reassign))
        .route("/task/delete", delete(routes::tasks::delete_task))
        .route("/everything", get(routes::everything::everything))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(invalid_endpoint)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

async fn invalid_endpoint(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Invalid endpoint: {}", uri.path()))
}

/// JWT authentication middleware layer
///
/// Validates the bearer token and injects an [`AuthContext`] into the
/// request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;

    let token = auth_header.strip_prefix("Bearer ").unwrap_or(auth_header).trim();

    let claims = jwt::validate_token(token, state.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected token");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(AuthContext::from(claims));

    Ok(next.run(req).await)
}
