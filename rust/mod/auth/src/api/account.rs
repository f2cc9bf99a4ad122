use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use geobuild_core::ServiceError;

use crate::api::AppState;
use crate::model::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh-token", post(refresh_token))
}

/// POST /auth/register: create an account and sign it in.
async fn register(
    State(svc): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let user = svc.register(body)?;
    Ok(Json(svc.issue_tokens(&user)?))
}

/// POST /auth/login
async fn login(
    State(svc): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    let user = svc.login(&body.email, &body.password)?;
    Ok(Json(svc.issue_tokens(&user)?))
}

/// POST /auth/refresh-token: rotate a refresh token.
async fn refresh_token(
    State(svc): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    Ok(Json(svc.refresh(&body.refresh_token)?))
}
