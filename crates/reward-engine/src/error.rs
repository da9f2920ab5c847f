use thiserror::Error;

use crate::store::StoreError;

/// Caller-visible failure of an engine operation.
///
/// `Validation` and `NotFound` are detected before any mutation. `Conflict`
/// should not be retried as-is. `Internal` and `Cancelled` leave no partial
/// settlement behind, so the whole operation is safe to retry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity) => Self::NotFound(entity),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Overflow(_) => Self::Conflict("balance limit reached".into()),
            StoreError::Internal(e) => Self::Internal(e),
        }
    }
}
