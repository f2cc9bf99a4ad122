pub mod api;
pub mod error;
pub mod model;
pub mod store;

use std::sync::Arc;

use axum::Router;
use geobuild_core::Module;
use geobuild_sql::SQLStore;

use store::ClientStore;

pub use error::ClientError;

/// The Client module: customer/project registry.
pub struct ClientModule {
    store: Arc<ClientStore>,
}

impl ClientModule {
    /// Create the client module and initialise storage.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, geobuild_core::ServiceError> {
        let store = Arc::new(ClientStore::new(db)?);
        Ok(Self { store })
    }
}

impl Module for ClientModule {
    fn name(&self) -> &str {
        "client"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.store))
    }
}
