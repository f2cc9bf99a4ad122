mod account;
mod me;

use std::sync::Arc;

use axum::Router;

use crate::service::AuthService;

/// Shared application state.
pub type AppState = Arc<AuthService>;

/// Build the auth API router.
///
/// Routes are nested under `/auth`; the caller mounts the result under `/api`.
/// Bearer verification happens in the server middleware, which lets
/// register, login and refresh-token through unauthenticated.
pub fn build_router(svc: Arc<AuthService>) -> Router {
    let api = Router::new().merge(account::routes()).merge(me::routes());

    Router::new().nest("/auth", api).with_state(svc)
}
