use axum::Router;

/// A service module that contributes HTTP routes.
///
/// Each business module (auth, clients, checklists, hub) implements this
/// trait. The server binary collects all modules and nests each router
/// under its mount point.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Path prefix the routes are nested under.
    fn mount(&self) -> &str {
        "/api"
    }

    /// Return the module's routes, relative to [`Module::mount`].
    fn routes(&self) -> Router;
}
