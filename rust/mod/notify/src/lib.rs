//! Real-time notification hub.
//!
//! Clients hold a WebSocket to `/hub/notificationHub` and receive workflow
//! events as `{"event", "data"}` frames. Connections are grouped by user
//! (`user-<id>`), role (`RMs`, `QSs`, `Admins`) and watched report
//! (`report-<id>`). [`Hub`] also implements
//! [`Notifier`](geobuild_core::Notifier), which is how the checklist engine
//! reaches it.

pub mod api;
pub mod event;
pub mod hub;

use std::sync::Arc;

use axum::Router;
use geobuild_core::Module;

pub use api::VerifyFn;
pub use event::HubEvent;
pub use hub::{ConnectionId, Hub};

/// The notification module. Mounted at the root, not under `/api`.
pub struct NotifyModule {
    hub: Arc<Hub>,
    verify: VerifyFn,
}

impl NotifyModule {
    pub fn new(verify: VerifyFn) -> Self {
        Self {
            hub: Arc::new(Hub::new()),
            verify,
        }
    }

    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }
}

impl Module for NotifyModule {
    fn name(&self) -> &str {
        "notify"
    }

    fn mount(&self) -> &str {
        "/"
    }

    fn routes(&self) -> Router {
        api::build_router(api::HubState {
            hub: Arc::clone(&self.hub),
            verify: Arc::clone(&self.verify),
        })
    }
}
