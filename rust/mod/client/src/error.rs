use thiserror::Error;

use geobuild_core::ServiceError;
use geobuild_sql::SQLError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    NotFound(String),

    #[error("Customer ID already exists.")]
    DuplicateCustomerId,

    #[error("Customer Number already exists.")]
    DuplicateCustomerNumber,

    #[error("{0}")]
    Validation(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl ClientError {
    /// Map a failed write, turning UNIQUE violations into the matching conflict.
    pub(crate) fn from_write(e: SQLError) -> Self {
        match e.unique_violation() {
            Some("clients.customer_id") => ClientError::DuplicateCustomerId,
            Some("clients.customer_number") => ClientError::DuplicateCustomerNumber,
            _ => ClientError::Storage(e.to_string()),
        }
    }
}

impl From<SQLError> for ClientError {
    fn from(e: SQLError) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl From<ClientError> for ServiceError {
    fn from(e: ClientError) -> Self {
        let message = e.to_string();
        match e {
            ClientError::NotFound(m) => ServiceError::NotFound(m),
            ClientError::DuplicateCustomerId | ClientError::DuplicateCustomerNumber => {
                ServiceError::Conflict(message)
            }
            ClientError::Validation(m) => ServiceError::Validation(m),
            ClientError::Storage(m) => ServiceError::Storage(m),
            ClientError::Internal(m) => ServiceError::Internal(m),
        }
    }
}
