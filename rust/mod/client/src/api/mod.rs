mod clients;

use std::sync::Arc;

use axum::Router;

use crate::store::ClientStore;

/// Build the client registry router.
///
/// Routes (relative to `/api`):
/// - `GET    /clients`                      : paged list, `?search=`
/// - `POST   /clients`                      : create
/// - `GET    /clients/search`               : quick search, top 10
/// - `GET    /clients/customer/{number}`    : lookup by customer number
/// - `GET    /clients/{id}`                 : get
/// - `PUT    /clients/{id}`                 : partial update
/// - `DELETE /clients/{id}`                 : delete
pub fn router(store: Arc<ClientStore>) -> Router {
    clients::router(store)
}
