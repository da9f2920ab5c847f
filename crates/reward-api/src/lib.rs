pub mod auth;
pub mod error;
pub mod middleware;
pub mod state;
pub mod tasks;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub use middleware::JwtAuth;
pub use state::{AppState, AppStateInner};

use crate::middleware::require_auth;

/// Every route of the service. `/api` requires a token; `/auth` and `/health`
/// are public.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/{task_id}/complete", post(tasks::complete_task))
        .route("/api/users/leaderboard", get(users::leaderboard))
        .route("/api/users/referrer", post(users::link_referrer))
        .route("/api/users/{user_id}/status", get(users::user_status))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
