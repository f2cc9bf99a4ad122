pub mod password;
pub mod schema;
pub mod session;
pub mod user;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use geobuild_sql::{SQLError, SQLStore};

/// Auth service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<AuthError> for geobuild_core::ServiceError {
    fn from(e: AuthError) -> Self {
        use geobuild_core::ServiceError;
        match e {
            AuthError::NotFound(m) => ServiceError::NotFound(m),
            AuthError::Conflict(m) => ServiceError::Conflict(m),
            AuthError::Validation(m) => ServiceError::Validation(m),
            AuthError::Unauthorized(m) => ServiceError::Unauthorized(m),
            AuthError::Storage(m) => ServiceError::Storage(m),
            AuthError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

impl From<SQLError> for AuthError {
    fn from(e: SQLError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

/// Token settings. Read once from the `[jwt]` section of the server config
/// and used for both signing and verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret.
    pub secret: String,
    /// `iss` claim.
    pub issuer: String,
    /// `aud` claim.
    pub audience: String,
    /// Access token lifetime in seconds (default: 7 days).
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds (default: 30 days).
    pub refresh_token_ttl: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "geoback".to_string(),
            audience: "GeoBuildClient".to_string(),
            access_token_ttl: 7 * 24 * 3600,
            refresh_token_ttl: 30 * 24 * 3600,
        }
    }
}

/// The Auth service. Holds storage and token configuration.
pub struct AuthService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) config: AuthConfig,
}

impl AuthService {
    /// Create a new AuthService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SQLStore>, config: AuthConfig) -> Result<Arc<Self>, AuthError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self { sql, config }))
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

/// Parse a timestamp column written by [`geobuild_core::sortable_ts`].
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>, AuthError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AuthError::Internal(format!("bad timestamp {raw:?}: {e}")))
}

#[cfg(test)]
pub(crate) fn test_service() -> Arc<AuthService> {
    let sql = Arc::new(geobuild_sql::SqliteStore::open_in_memory().unwrap());
    let config = AuthConfig {
        secret: "test-secret-that-is-long-enough-for-hs256".into(),
        ..Default::default()
    };
    AuthService::new(sql, config).unwrap()
}
