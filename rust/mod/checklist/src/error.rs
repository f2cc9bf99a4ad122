use thiserror::Error;

use geobuild_blob::BlobError;
use geobuild_core::ServiceError;
use geobuild_sql::SQLError;

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Held by another user and not yet expired.
    #[error("{0}")]
    Locked(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<SQLError> for ChecklistError {
    fn from(e: SQLError) -> Self {
        ChecklistError::Storage(e.to_string())
    }
}

impl From<BlobError> for ChecklistError {
    fn from(e: BlobError) -> Self {
        ChecklistError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ChecklistError {
    fn from(e: serde_json::Error) -> Self {
        ChecklistError::Internal(e.to_string())
    }
}

impl From<ChecklistError> for ServiceError {
    fn from(e: ChecklistError) -> Self {
        match e {
            ChecklistError::NotFound(m) => ServiceError::NotFound(m),
            ChecklistError::Validation(m) => ServiceError::Validation(m),
            ChecklistError::Unauthorized(m) => ServiceError::Unauthorized(m),
            ChecklistError::Locked(m) => ServiceError::Locked(m),
            ChecklistError::Conflict(m) => ServiceError::Conflict(m),
            ChecklistError::Storage(m) => ServiceError::Storage(m),
            ChecklistError::Internal(m) => ServiceError::Internal(m),
        }
    }
}
