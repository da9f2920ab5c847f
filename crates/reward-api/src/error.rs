use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reward_engine::EngineError;
use reward_types::api::ErrorBody;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(EngineError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Engine(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Engine(EngineError::Cancelled) => StatusCode::GATEWAY_TIMEOUT,
            Self::Engine(EngineError::Internal(_)) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store details stay in the log, never in the response.
        let message = match &self {
            Self::Engine(EngineError::Internal(e)) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub(crate) fn join_error(e: JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", e);
    ApiError::Internal
}
