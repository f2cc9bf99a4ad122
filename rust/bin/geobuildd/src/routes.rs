//! Route registration: builds every module and collects their routes
//! together with the system endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use auth::{AuthModule, AuthService};
use checklist::ChecklistModule;
use client::ClientModule;
use geobuild_blob::BlobStore;
use geobuild_core::{Module, Notifier, ServiceError, UserDirectory};
use geobuild_sql::SQLStore;
use notify::{NotifyModule, VerifyFn};

use crate::auth_middleware;
use crate::config::ServerConfig;

/// State for the system endpoints.
#[derive(Clone)]
pub struct AppState {
    pub sql: Arc<dyn SQLStore>,
}

/// Construct all modules over the shared stores and assemble the router.
pub fn build_app(
    config: &ServerConfig,
    sql: Arc<dyn SQLStore>,
    blobs: Arc<dyn BlobStore>,
) -> anyhow::Result<Router> {
    let auth_module = AuthModule::new(Arc::clone(&sql), config.jwt.clone())?;
    let auth = Arc::clone(auth_module.service());
    info!("Auth module initialized");

    let client_module = ClientModule::new(Arc::clone(&sql))?;
    info!("Client module initialized");

    let verifier = Arc::clone(&auth);
    let verify: VerifyFn =
        Arc::new(move |token: &str| verifier.verify_token(token).map_err(ServiceError::from));
    let notify_module = NotifyModule::new(verify);
    info!("Notification hub initialized");

    let notifier: Arc<dyn Notifier> = notify_module.hub();
    let users: Arc<dyn UserDirectory> = auth.clone();
    let checklist_module = ChecklistModule::new(
        Arc::clone(&sql),
        blobs,
        notifier,
        users,
        config.review.clone(),
    )?;
    info!("Checklist module initialized");

    let modules: [&dyn Module; 4] = [&auth_module, &client_module, &checklist_module, &notify_module];
    Ok(build_router(
        AppState { sql },
        auth,
        &modules,
        &config.server.cors_origins,
    ))
}

/// Build the complete router with all routes.
pub fn build_router(
    state: AppState,
    auth: Arc<AuthService>,
    modules: &[&dyn Module],
    cors_origins: &[String],
) -> Router {
    let mut app: Router = Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state);

    // Modules sharing a mount point are merged first, then nested once.
    let mut mounts: BTreeMap<&str, Router> = BTreeMap::new();
    for module in modules {
        info!("Mounting module {} at {}", module.name(), module.mount());
        let entry = mounts.entry(module.mount()).or_default();
        *entry = std::mem::take(entry).merge(module.routes());
    }
    for (mount, router) in mounts {
        app = if mount == "/" { app.merge(router) } else { app.nest(mount, router) };
    }

    app.layer(middleware::from_fn_with_state(auth, auth_middleware::auth_middleware))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.sql.query("SELECT 1", &[]) {
        Ok(_) => "ok",
        Err(e) => {
            warn!("health check: database unavailable: {}", e);
            "error"
        }
    };
    axum::Json(serde_json::json!({
        "status": "ok",
        "database": database,
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "geobuildd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
