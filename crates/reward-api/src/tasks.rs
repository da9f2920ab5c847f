use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use reward_engine::EngineError;
use reward_types::TaskId;
use reward_types::api::{
    Claims, CreateTaskRequest, CreateTaskResponse, MessageResponse, TaskListResponse,
};

use crate::error::{ApiError, join_error};
use crate::state::AppState;

pub async fn create_task(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let task_id = tokio::task::spawn_blocking(move || {
        worker
            .catalog
            .create_task(&req.title, &req.description, req.price)
    })
    .await
    .map_err(join_error)??;

    Ok((StatusCode::CREATED, Json(CreateTaskResponse { task_id })))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let worker = state.clone();
    let tasks = tokio::task::spawn_blocking(move || worker.catalog.list_tasks())
        .await
        .map_err(join_error)??;

    Ok(Json(TaskListResponse { tasks }))
}

/// Settles `task_id` for the authenticated user.
///
/// The settlement runs on the blocking pool under `request_timeout`. If the
/// deadline passes or the client goes away, the token is cancelled and the
/// settlement stops at its next checkpoint.
pub async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let worker = state.clone();
    let token = cancel.clone();
    let job = tokio::task::spawn_blocking(move || {
        worker.settlement.complete_task(user_id, task_id, &token)
    });

    let settled = match tokio::time::timeout(state.request_timeout, job).await {
        Ok(joined) => joined.map_err(join_error)??,
        Err(_) => {
            cancel.cancel();
            warn!(user_id = %user_id, task_id = %task_id, "Task completion timed out");
            return Err(EngineError::Cancelled.into());
        }
    };
    guard.disarm();

    Ok(Json(MessageResponse {
        message: format!(
            "Task completed successfully, {} credited",
            settled.credited
        ),
    }))
}
