use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use geobuild_core::{Claims, ServiceError};

use crate::api::AppState;
use crate::model::{ChangePasswordRequest, UserDto};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/change-password", post(change_password))
}

/// GET /auth/me: current user, loaded by the token subject.
async fn me(
    State(svc): State<AppState>,
    claims: Claims,
) -> Result<Json<UserDto>, ServiceError> {
    let user = svc.get_user(&claims.sub)?;
    Ok(Json(UserDto::from(&user)))
}

/// POST /auth/change-password
async fn change_password(
    State(svc): State<AppState>,
    claims: Claims,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ServiceError> {
    svc.change_password(&claims.sub, &body)?;
    Ok(Json(json!({"message": "Password changed successfully"})))
}
