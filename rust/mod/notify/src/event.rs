use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Server → client frame: `{"event": "<Name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    pub event: String,
    pub data: Value,
}

impl HubEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn test_response() -> Self {
        Self::new("TestResponse", json!("Connection successful"))
    }

    pub fn notification(payload: Value) -> Self {
        Self::new("ReceiveNotification", payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", json!({"message": message.into()}))
    }

    pub fn report_status_changed(report_id: &str, old_status: &str, new_status: &str) -> Self {
        Self::new(
            "ReportStatusChanged",
            json!({
                "reportId": report_id,
                "oldStatus": old_status,
                "newStatus": new_status,
                "timestamp": Utc::now(),
            }),
        )
    }

    pub fn new_comment(report_id: &str, comment_id: &str, user_id: &str) -> Self {
        Self::new(
            "NewComment",
            json!({
                "reportId": report_id,
                "commentId": comment_id,
                "userId": user_id,
                "timestamp": Utc::now(),
            }),
        )
    }

    pub fn decision_made(report_id: &str, decision: &str, qs_id: &str) -> Self {
        Self::new(
            "DecisionMade",
            json!({
                "reportId": report_id,
                "decision": decision,
                "qsId": qs_id,
                "timestamp": Utc::now(),
            }),
        )
    }
}

/// Client → server frame, selected by `method`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    TestConnection,
    SendToUser {
        user_id: String,
        #[serde(default)]
        notification: Value,
    },
    SendToGroup {
        group: String,
        #[serde(default)]
        notification: Value,
    },
    JoinGroup {
        group: String,
    },
    LeaveGroup {
        group: String,
    },
    ReportStatusChanged {
        report_id: String,
        old_status: String,
        new_status: String,
    },
    NewComment {
        report_id: String,
        comment_id: String,
        user_id: String,
    },
    DecisionMade {
        report_id: String,
        decision: String,
        qs_id: String,
    },
}

/// Group every watcher of one report joins.
pub fn report_group(report_id: &str) -> String {
    format!("report-{report_id}")
}
