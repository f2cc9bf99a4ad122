mod checklists;
mod reviews;

use std::sync::Arc;

use axum::Router;

use crate::engine::ChecklistEngine;
use crate::photos::PhotoStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChecklistEngine>,
    pub photos: Arc<PhotoStore>,
}

/// Build the checklist router. The caller mounts the result under `/api`.
///
/// RM surface (`/rmChecklist`):
/// - `GET  /rmChecklist`                 : all checklists
/// - `POST /rmChecklist`                 : create
/// - `GET  /rmChecklist/{id}`            : get
/// - `PUT  /rmChecklist/{id}`            : update
/// - `POST /rmChecklist/{id}/lock`       : take or refresh the edit lock
/// - `POST /rmChecklist/{id}/unlock`     : release it
/// - `POST /rmChecklist/photos`          : multipart upload
/// - `GET  /rmChecklist/photos/{name}`   : serve an uploaded photo
///
/// QS surface (`/qs`): dashboard, review queues, comments and decisions.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/rmChecklist", checklists::routes())
        .nest("/qs", reviews::routes())
        .with_state(state)
}
