//! Loan checklists and the QS review workflow.
//!
//! An RM creates a checklist (call report) for a customer, fills in the
//! document list and site-visit form, uploads photos and submits it. A QS
//! takes it from the pending queue, comments, and approves, rejects or
//! sends it back for revision. Every status change is broadcast through the
//! [`Notifier`](geobuild_core::Notifier) the module is built with.

pub mod api;
pub mod engine;
pub mod error;
pub mod model;
pub mod photos;
pub mod store;

use std::sync::Arc;

use axum::Router;
use geobuild_blob::BlobStore;
use geobuild_core::{Module, Notifier, UserDirectory};
use geobuild_sql::SQLStore;

use engine::ChecklistEngine;
use photos::PhotoStore;
use store::ChecklistStore;

pub use engine::ReviewConfig;
pub use error::ChecklistError;

/// The checklist module.
pub struct ChecklistModule {
    state: api::AppState,
}

impl ChecklistModule {
    pub fn new(
        db: Arc<dyn SQLStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        users: Arc<dyn UserDirectory>,
        config: ReviewConfig,
    ) -> Result<Self, ChecklistError> {
        let store = ChecklistStore::new(db)?;
        let engine = ChecklistEngine::new(store, notifier, users, config);
        Ok(Self {
            state: api::AppState {
                engine: Arc::new(engine),
                photos: Arc::new(PhotoStore::new(blobs)),
            },
        })
    }

    pub fn engine(&self) -> &Arc<ChecklistEngine> {
        &self.state.engine
    }
}

impl Module for ChecklistModule {
    fn name(&self) -> &str {
        "checklist"
    }

    fn routes(&self) -> Router {
        api::build_router(self.state.clone())
    }
}
