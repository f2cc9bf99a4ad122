use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use geobuild_core::UserRef;

use super::{ChecklistStatus, Priority, SiteVisitForm};

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

fn default_document_status() -> String {
    "pendingrm".to_string()
}

/// One required document and where it stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_document_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCategory {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub doc_list: Vec<DocumentItem>,
}

// ---------------------------------------------------------------------------
// ReportLock
// ---------------------------------------------------------------------------

/// Edit lock on a report. Expires on its own after `expires_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLock {
    pub locked_by_user_id: String,
    pub locked_by_user_name: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ReportLock {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ---------------------------------------------------------------------------
// Checklist: stored as JSON in `checklists.data`, with index columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: String,
    /// Report number, `CRN-001` onwards.
    pub dcl_no: String,

    // --- customer ---
    #[serde(default)]
    pub customer_id: Option<String>,
    pub customer_number: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Also exposed as `loanType`.
    pub project_name: String,
    #[serde(default)]
    pub ibps_no: String,

    // --- ownership ---
    #[serde(default, rename = "assignedToRM")]
    pub assigned_to_rm: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,

    // --- content ---
    #[serde(default)]
    pub documents: Vec<DocumentCategory>,
    #[serde(default)]
    pub site_visit_form: Option<SiteVisitForm>,

    // --- workflow ---
    pub status: ChecklistStatus,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, rename = "assignedToQS")]
    pub assigned_to_qs: Option<String>,
    #[serde(default, rename = "assignedToQSName")]
    pub assigned_to_qs_name: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub lock: Option<ReportLock>,

    // --- timestamps ---
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checklist {
    /// The lock, if one is held and has not expired.
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<&ReportLock> {
        self.lock.as_ref().filter(|l| l.is_active(now))
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Body of `POST /rmChecklist` and `PUT /rmChecklist/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChecklistRequest {
    pub customer_id: Option<String>,
    pub customer_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub project_name: String,
    /// Older clients send the project name under this key.
    pub loan_type: Option<String>,
    pub ibps_no: Option<String>,
    #[serde(rename = "assignedToRM")]
    pub assigned_to_rm: Option<String>,
    /// Update only; see [`ChecklistStatus::from_rm_update`].
    pub status: Option<String>,
    pub documents: Vec<DocumentCategory>,
    pub site_visit_form: Option<SiteVisitForm>,
    pub priority: Option<String>,
}

impl ChecklistRequest {
    /// `projectName`, falling back to `loanType`.
    pub fn resolved_project_name(&self) -> &str {
        if !self.project_name.trim().is_empty() {
            self.project_name.trim()
        } else {
            self.loan_type.as_deref().unwrap_or_default().trim()
        }
    }

    /// Names of required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let blank = |v: Option<&str>| v.is_none_or(|s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(Some(&self.customer_number)) {
            missing.push("customerNumber");
        }
        if blank(Some(&self.customer_name)) {
            missing.push("customerName");
        }
        if self.resolved_project_name().is_empty() {
            missing.push("projectName");
        }
        if blank(self.assigned_to_rm.as_deref()) {
            missing.push("assignedToRM");
        }
        if blank(self.ibps_no.as_deref()) {
            missing.push("ibpsNo");
        }
        missing
    }
}

/// Body of `POST /rmChecklist/{id}/lock`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockRequest {
    pub lock_duration_minutes: Option<i64>,
}

// ---------------------------------------------------------------------------
// ChecklistView: response shape
// ---------------------------------------------------------------------------

/// Who holds a report lock, as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockHolder {
    pub id: String,
    pub name: String,
}

/// A checklist as returned by the API: the stored record plus the resolved
/// RM and the aliases older clients read (`_id`, `callReportNo`, `loanType`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistView {
    pub id: String,
    #[serde(rename = "_id")]
    pub legacy_id: String,
    pub dcl_no: String,
    pub call_report_no: String,
    pub customer_id: Option<String>,
    pub customer_number: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub project_name: String,
    pub loan_type: String,
    pub ibps_no: String,
    pub status: ChecklistStatus,
    #[serde(rename = "assignedToRM")]
    pub assigned_to_rm: Option<UserRef>,
    pub created_by: Option<String>,
    pub documents: Vec<DocumentCategory>,
    pub site_visit_form: Option<SiteVisitForm>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub is_locked: bool,
    pub locked_by: Option<LockHolder>,
    pub locked_at: Option<DateTime<Utc>>,
    pub lock_expires_at: Option<DateTime<Utc>>,

    #[serde(rename = "assignedToQS")]
    pub assigned_to_qs: Option<String>,
    #[serde(rename = "assignedToQSName")]
    pub assigned_to_qs_name: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
}

impl ChecklistView {
    pub fn new(checklist: Checklist, rm: Option<UserRef>, now: DateTime<Utc>) -> Self {
        let lock = checklist.active_lock(now).cloned();
        Self {
            legacy_id: checklist.id.clone(),
            id: checklist.id,
            call_report_no: checklist.dcl_no.clone(),
            dcl_no: checklist.dcl_no,
            customer_id: checklist.customer_id,
            customer_number: checklist.customer_number,
            customer_name: checklist.customer_name,
            customer_email: checklist.customer_email,
            loan_type: checklist.project_name.clone(),
            project_name: checklist.project_name,
            ibps_no: checklist.ibps_no,
            status: checklist.status,
            assigned_to_rm: rm,
            created_by: checklist.created_by,
            documents: checklist.documents,
            site_visit_form: checklist.site_visit_form,
            created_at: checklist.created_at,
            updated_at: checklist.updated_at,
            is_locked: lock.is_some(),
            locked_by: lock.as_ref().map(|l| LockHolder {
                id: l.locked_by_user_id.clone(),
                name: l.locked_by_user_name.clone(),
            }),
            locked_at: lock.as_ref().map(|l| l.locked_at),
            lock_expires_at: lock.as_ref().map(|l| l.expires_at),
            assigned_to_qs: checklist.assigned_to_qs,
            assigned_to_qs_name: checklist.assigned_to_qs_name,
            submitted_at: checklist.submitted_at,
            priority: checklist.priority,
            reviewed_at: checklist.reviewed_at,
            reviewed_by: checklist.reviewed_by,
        }
    }
}
