use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use geobuild_core::{Claims, Notifier};

use crate::event::{report_group, ClientFrame, HubEvent};

/// Identifies one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct Connection {
    tx: mpsc::UnboundedSender<HubEvent>,
    user_id: Option<String>,
}

/// In-process fan-out of workflow events to connected clients.
///
/// Delivery is at-most-once to whoever is connected at send time. Each
/// connection has an unbounded queue, so senders never wait on a slow
/// client. A connection whose receiver is gone is pruned on the next send.
pub struct Hub {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    groups: RwLock<HashMap<String, HashSet<ConnectionId>>>,
    next_id: AtomicU64,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection. Authenticated connections join their user
    /// group and role group; anonymous ones join nothing.
    pub fn connect(
        &self,
        claims: Option<&Claims>,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<HubEvent>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        write(&self.connections).insert(
            id,
            Connection {
                tx,
                user_id: claims.map(|c| c.sub.clone()),
            },
        );
        if let Some(claims) = claims {
            for group in claims.default_groups() {
                self.join(id, &group);
            }
            info!(user = %claims.sub, role = %claims.role, "hub connected");
        }
        (id, rx)
    }

    /// Drop a connection and its group memberships.
    pub fn disconnect(&self, id: ConnectionId) {
        let removed = write(&self.connections).remove(&id);
        let mut groups = write(&self.groups);
        groups.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        if let Some(user) = removed.and_then(|c| c.user_id) {
            info!(user = %user, "hub disconnected");
        }
    }

    /// No-op once the connection is gone. The liveness check runs under the
    /// groups guard, which `disconnect` takes after removing the connection.
    pub fn join(&self, id: ConnectionId, group: &str) {
        let mut groups = write(&self.groups);
        if !read(&self.connections).contains_key(&id) {
            return;
        }
        groups.entry(group.to_string()).or_default().insert(id);
        debug!(conn = id.0, group, "joined group");
    }

    pub fn leave(&self, id: ConnectionId, group: &str) {
        let mut groups = write(&self.groups);
        if let Some(members) = groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                groups.remove(group);
            }
        }
        debug!(conn = id.0, group, "left group");
    }

    pub fn send_to_all(&self, event: HubEvent) {
        let targets: Vec<ConnectionId> = read(&self.connections).keys().copied().collect();
        self.deliver(&targets, &event);
    }

    pub fn send_to_group(&self, group: &str, event: HubEvent) {
        let targets: Vec<ConnectionId> = read(&self.groups)
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();
        self.deliver(&targets, &event);
    }

    /// Send a `ReceiveNotification` to every connection of `user_id`.
    pub fn send_to_user(&self, user_id: &str, payload: Value) {
        self.send_to_group(&format!("user-{user_id}"), HubEvent::notification(payload));
    }

    /// Reply `TestResponse` to the caller only.
    pub fn test_connection(&self, id: ConnectionId) {
        self.deliver(&[id], &HubEvent::test_response());
    }

    /// Act on one text frame from a client. Bad frames get an `Error` event
    /// back and leave the connection open.
    pub fn handle_frame(&self, id: ConnectionId, raw: &str) {
        let frame = match serde_json::from_str::<ClientFrame>(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(conn = id.0, error = %e, "invalid hub frame");
                self.deliver(&[id], &HubEvent::error(format!("Invalid message: {e}")));
                return;
            }
        };
        match frame {
            ClientFrame::TestConnection => self.test_connection(id),
            ClientFrame::SendToUser { user_id, notification } => {
                self.send_to_user(&user_id, notification)
            }
            ClientFrame::SendToGroup { group, notification } => {
                self.send_to_group(&group, HubEvent::notification(notification))
            }
            ClientFrame::JoinGroup { group } => self.join(id, &group),
            ClientFrame::LeaveGroup { group } => self.leave(id, &group),
            ClientFrame::ReportStatusChanged { report_id, old_status, new_status } => {
                self.report_status_changed(&report_id, &old_status, &new_status)
            }
            ClientFrame::NewComment { report_id, comment_id, user_id } => {
                self.new_comment(&report_id, &comment_id, &user_id)
            }
            ClientFrame::DecisionMade { report_id, decision, qs_id } => {
                self.decision_made(&report_id, &decision, &qs_id)
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        read(&self.connections).len()
    }

    pub fn is_member(&self, id: ConnectionId, group: &str) -> bool {
        read(&self.groups)
            .get(group)
            .is_some_and(|members| members.contains(&id))
    }

    fn deliver(&self, targets: &[ConnectionId], event: &HubEvent) {
        let mut closed = Vec::new();
        {
            let connections = read(&self.connections);
            for id in targets {
                if let Some(conn) = connections.get(id) {
                    if conn.tx.send(event.clone()).is_err() {
                        closed.push(*id);
                    }
                }
            }
        }
        for id in closed {
            self.disconnect(id);
        }
    }
}

impl Notifier for Hub {
    fn report_status_changed(&self, report_id: &str, old_status: &str, new_status: &str) {
        self.send_to_all(HubEvent::report_status_changed(report_id, old_status, new_status));
    }

    fn new_comment(&self, report_id: &str, comment_id: &str, user_id: &str) {
        self.send_to_group(
            &report_group(report_id),
            HubEvent::new_comment(report_id, comment_id, user_id),
        );
    }

    fn decision_made(&self, report_id: &str, decision: &str, qs_id: &str) {
        self.send_to_group(
            &report_group(report_id),
            HubEvent::decision_made(report_id, decision, qs_id),
        );
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
