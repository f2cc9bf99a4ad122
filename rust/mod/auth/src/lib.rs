//! Auth module: accounts, password login and token issuance.
//!
//! # Resources
//!
//! - **User**: email/password account with a single [`geobuild_core::Role`]
//! - **Refresh token**: opaque, stored hashed, rotated on every use
//!
//! Access tokens are HS256 JWTs carrying [`geobuild_core::Claims`]. The same
//! [`AuthService::verify_token`] backs the HTTP middleware and the hub handshake.
//!
//! # Usage
//!
//! ```ignore
//! use auth::{AuthModule, AuthConfig};
//!
//! let module = AuthModule::new(sql, AuthConfig::default())?;
//! let router = module.routes(); // Mount under /api
//! ```

pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;

use geobuild_core::{Module, ServiceError};
use geobuild_sql::SQLStore;

pub use crate::service::{AuthConfig, AuthError, AuthService};

/// Auth module implementing the Module trait.
pub struct AuthModule {
    service: Arc<AuthService>,
}

impl AuthModule {
    pub fn new(sql: Arc<dyn SQLStore>, config: AuthConfig) -> Result<Self, ServiceError> {
        let service = AuthService::new(sql, config)?;
        Ok(Self { service })
    }

    /// The underlying service, shared with the middleware and other modules.
    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }
}

impl Module for AuthModule {
    fn name(&self) -> &str {
        "auth"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
