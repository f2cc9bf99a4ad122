pub mod auth;
pub mod config;
pub mod error;
pub mod module;
pub mod notify;
pub mod types;

pub use auth::{Claims, Role, UserDirectory, UserRef};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use module::Module;
pub use notify::{Notifier, NoopNotifier};
pub use types::{Page, PageParams, new_id, sortable_ts};
