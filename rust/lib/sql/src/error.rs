use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// UNIQUE / FOREIGN KEY / NOT NULL violation. Carries SQLite's message,
    /// e.g. `UNIQUE constraint failed: clients.customer_id`.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    /// The `table.column` a UNIQUE constraint failed on, if that is what this error is.
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            SQLError::Constraint(msg) => msg
                .split("UNIQUE constraint failed: ")
                .nth(1)
                .map(|rest| rest.split([',', ' ']).next().unwrap_or(rest)),
            _ => None,
        }
    }
}
