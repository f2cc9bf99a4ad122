//! JWT authentication middleware.
//!
//! Extracts the token from `Authorization: Bearer <token>`, validates it with
//! the auth service and stores [`Claims`] in the request extensions, where
//! the `Claims` extractor picks it up.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;

use auth::AuthService;
use geobuild_core::{Claims, ServiceError};

/// Middleware that validates the bearer token on every non-public path.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if is_public(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Missing authorization token".into()))?;

    let claims: Claims = auth.verify_token(token)?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Check if a request is public (no auth required).
fn is_public(method: &Method, path: &str) -> bool {
    matches!(
        path,
        "/health" | "/version" | "/api/auth/register" | "/api/auth/login" | "/api/auth/refresh-token"
    ) || path.starts_with("/hub/") // The hub authenticates its own handshake
      || (method == Method::GET && path.starts_with("/api/rmChecklist/photos/"))
}
