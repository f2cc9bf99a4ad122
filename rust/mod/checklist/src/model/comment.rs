use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry in a report's comment log. Never edited or deleted on its own;
/// the author fields are a snapshot taken when the comment was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub report_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_role: String,
    pub text: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /qs/reviews/{id}/comments`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddCommentRequest {
    pub comment: String,
    pub is_internal: bool,
}

/// Body of `POST /qs/reviews/{id}/revision`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevisionRequest {
    pub notes: String,
    pub required_changes: Vec<String>,
}

impl RevisionRequest {
    pub fn comment_text(&self) -> String {
        format!(
            "Revision requested: {}\nRequired changes: {}",
            self.notes,
            self.required_changes.join(", ")
        )
    }
}

/// Body of `POST /qs/reviews/{id}/approve`. The body itself is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApproveRequest {
    pub notes: Option<String>,
}

/// Body of `POST /qs/reviews/{id}/reject`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RejectRequest {
    pub reason: String,
}

/// Counters on the reviewer dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub pending_reviews: i64,
    pub in_progress: i64,
    pub completed_today: i64,
    pub scheduled_visits: i64,
    pub average_response_time: String,
    pub critical_issues: i64,
    pub my_active_reviews: i64,
    pub overdue_reviews: i64,
}
