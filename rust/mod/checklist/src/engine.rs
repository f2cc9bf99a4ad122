use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::info;

use geobuild_core::{new_id, Claims, Notifier, Page, PageParams, UserDirectory, UserRef};

use crate::error::ChecklistError;
use crate::model::{
    AddCommentRequest, ApproveRequest, Checklist, ChecklistRequest, ChecklistStatus,
    ChecklistView, Comment, DashboardStats, LockRequest, Priority, RejectRequest, ReportLock,
    RevisionRequest,
};
use crate::store::{ChecklistStore, QueueOrder};

// ---------------------------------------------------------------------------
// ReviewConfig
// ---------------------------------------------------------------------------

/// `[review]` section of the server config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// An under-review report untouched for longer than this is overdue.
    pub overdue_after_hours: i64,
    pub default_lock_minutes: i64,
    pub max_lock_minutes: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            overdue_after_hours: 48,
            default_lock_minutes: 30,
            max_lock_minutes: 480,
        }
    }
}

impl ReviewConfig {
    fn lock_minutes(&self, requested: Option<i64>) -> i64 {
        let max = self.max_lock_minutes.max(1);
        requested
            .unwrap_or(self.default_lock_minutes)
            .clamp(1, max)
    }
}

/// What a review transition produced, besides the status change.
struct Outcome {
    comment: Option<String>,
    decision: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// ChecklistEngine
// ---------------------------------------------------------------------------

/// Checklist lifecycle and QS review workflow.
///
/// Every write is a read-modify-write of one checklist row, serialized by
/// `write_lock` so that lock checks and status transitions see a consistent
/// record. Events go out only after the write has committed.
pub struct ChecklistEngine {
    store: ChecklistStore,
    notifier: Arc<dyn Notifier>,
    users: Arc<dyn UserDirectory>,
    config: ReviewConfig,
    write_lock: Mutex<()>,
}

impl ChecklistEngine {
    pub fn new(
        store: ChecklistStore,
        notifier: Arc<dyn Notifier>,
        users: Arc<dyn UserDirectory>,
        config: ReviewConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            users,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ChecklistStore {
        &self.store
    }

    // =======================================================================
    // Checklists (RM surface)
    // =======================================================================

    pub fn list_all(&self) -> Result<Vec<ChecklistView>, ChecklistError> {
        let checklists = self.store.list_all()?;
        self.views(checklists)
    }

    pub fn get(&self, id: &str) -> Result<ChecklistView, ChecklistError> {
        let checklist = self
            .store
            .get(id)?
            .ok_or_else(|| ChecklistError::NotFound("Checklist not found.".into()))?;
        self.view(checklist)
    }

    pub fn create(
        &self,
        claims: &Claims,
        req: ChecklistRequest,
    ) -> Result<ChecklistView, ChecklistError> {
        let (caller_id, _) = caller(claims)?;
        validate(&req)?;
        let priority = parse_priority(req.priority.as_deref())?;

        let now = Utc::now();
        let checklist = Checklist {
            id: new_id(),
            dcl_no: self.store.next_report_number()?,
            customer_id: non_blank(req.customer_id.as_deref()),
            customer_number: req.customer_number.trim().to_string(),
            customer_name: req.customer_name.trim().to_string(),
            customer_email: non_blank(req.customer_email.as_deref()),
            project_name: req.resolved_project_name().to_string(),
            ibps_no: req.ibps_no.as_deref().unwrap_or_default().trim().to_string(),
            assigned_to_rm: non_blank(req.assigned_to_rm.as_deref()),
            created_by: Some(caller_id.to_string()),
            documents: req.documents,
            site_visit_form: req.site_visit_form,
            status: ChecklistStatus::Pending,
            priority,
            assigned_to_qs: None,
            assigned_to_qs_name: None,
            submitted_at: None,
            reviewed_at: None,
            reviewed_by: None,
            lock: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&checklist)?;
        info!(id = %checklist.id, dcl_no = %checklist.dcl_no, "checklist created");
        self.view(checklist)
    }

    pub fn update(
        &self,
        id: &str,
        claims: &Claims,
        req: ChecklistRequest,
    ) -> Result<ChecklistView, ChecklistError> {
        let (caller_id, _) = caller(claims)?;
        validate(&req)?;
        let priority = parse_priority(req.priority.as_deref())?;

        let _guard = self.write_guard()?;
        let now = Utc::now();
        let mut checklist = self
            .store
            .get(id)?
            .ok_or_else(|| ChecklistError::NotFound("Checklist not found.".into()))?;
        ensure_not_locked(&checklist, caller_id, now)?;

        let old_status = checklist.status;
        let new_status = ChecklistStatus::from_rm_update(req.status.as_deref(), old_status);
        if new_status == ChecklistStatus::PendingQsReview && old_status != new_status {
            checklist.submitted_at = Some(now);
        }

        checklist.customer_id = non_blank(req.customer_id.as_deref());
        checklist.customer_number = req.customer_number.trim().to_string();
        checklist.customer_name = req.customer_name.trim().to_string();
        checklist.customer_email = non_blank(req.customer_email.as_deref());
        checklist.project_name = req.resolved_project_name().to_string();
        checklist.ibps_no = req.ibps_no.as_deref().unwrap_or_default().trim().to_string();
        checklist.assigned_to_rm = non_blank(req.assigned_to_rm.as_deref());
        checklist.documents = req.documents;
        if let Some(form) = req.site_visit_form {
            checklist.site_visit_form = Some(form);
        }
        if priority.is_some() {
            checklist.priority = priority;
        }
        checklist.status = new_status;
        clear_expired_lock(&mut checklist, now);
        checklist.updated_at = now;

        self.store.save(&checklist, None)?;
        if old_status != new_status {
            info!(id, from = %old_status, to = %new_status, "checklist status changed");
            self.notifier
                .report_status_changed(id, old_status.as_str(), new_status.as_str());
        }
        self.view(checklist)
    }

    /// Take or refresh the edit lock.
    pub fn lock(
        &self,
        id: &str,
        claims: &Claims,
        req: LockRequest,
    ) -> Result<ReportLock, ChecklistError> {
        let (caller_id, caller_name) = caller(claims)?;
        let _guard = self.write_guard()?;
        let now = Utc::now();
        let mut checklist = self
            .store
            .get(id)?
            .ok_or_else(|| ChecklistError::NotFound("Checklist not found.".into()))?;
        ensure_not_locked(&checklist, caller_id, now)?;

        let minutes = self.config.lock_minutes(req.lock_duration_minutes);
        let lock = ReportLock {
            locked_by_user_id: caller_id.to_string(),
            locked_by_user_name: caller_name.to_string(),
            locked_at: now,
            expires_at: now + Duration::minutes(minutes),
        };
        checklist.lock = Some(lock.clone());
        checklist.updated_at = now;
        self.store.save(&checklist, None)?;
        info!(id, user = caller_id, minutes, "report locked");
        Ok(lock)
    }

    /// Release the edit lock. Admins may release someone else's.
    pub fn unlock(&self, id: &str, claims: &Claims) -> Result<(), ChecklistError> {
        let (caller_id, _) = caller(claims)?;
        let _guard = self.write_guard()?;
        let now = Utc::now();
        let mut checklist = self
            .store
            .get(id)?
            .ok_or_else(|| ChecklistError::NotFound("Checklist not found.".into()))?;
        if checklist.lock.is_none() {
            return Ok(());
        }
        if claims.role != geobuild_core::Role::Admin {
            ensure_not_locked(&checklist, caller_id, now)?;
        }
        checklist.lock = None;
        checklist.updated_at = now;
        self.store.save(&checklist, None)?;
        info!(id, user = caller_id, "report unlocked");
        Ok(())
    }

    // =======================================================================
    // Review workflow (QS surface)
    // =======================================================================

    pub fn get_report(&self, id: &str) -> Result<ChecklistView, ChecklistError> {
        let checklist = self.load_report(id)?;
        self.view(checklist)
    }

    pub fn pending(&self, page: &PageParams) -> Result<Page<ChecklistView>, ChecklistError> {
        self.queue(
            &[ChecklistStatus::Submitted, ChecklistStatus::PendingQsReview],
            QueueOrder::Submitted,
            page,
        )
    }

    pub fn in_progress(&self, page: &PageParams) -> Result<Page<ChecklistView>, ChecklistError> {
        self.queue(&[ChecklistStatus::UnderReview], QueueOrder::Updated, page)
    }

    pub fn completed(&self, page: &PageParams) -> Result<Page<ChecklistView>, ChecklistError> {
        self.queue(&[ChecklistStatus::Approved], QueueOrder::Updated, page)
    }

    pub fn my_active(&self, claims: &Claims) -> Result<Vec<ChecklistView>, ChecklistError> {
        let checklists = self.store.active_for_reviewer(&claims.sub)?;
        self.views(checklists)
    }

    pub fn dashboard(&self, claims: &Claims) -> Result<DashboardStats, ChecklistError> {
        let now = Utc::now();
        let midnight = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(now);
        let stale_before = now - Duration::hours(self.config.overdue_after_hours);
        let counts = self.store.status_counts(&claims.sub, &midnight, &stale_before)?;
        let intervals = self.store.approval_intervals()?;

        Ok(DashboardStats {
            pending_reviews: counts.pending,
            in_progress: counts.in_progress,
            completed_today: counts.completed_since,
            scheduled_visits: 0,
            average_response_time: average_response_time(&intervals),
            critical_issues: counts.critical,
            my_active_reviews: counts.mine_active,
            overdue_reviews: counts.overdue,
        })
    }

    pub fn comments(&self, report_id: &str) -> Result<Vec<Comment>, ChecklistError> {
        self.load_report(report_id)?;
        self.store.comments_for(report_id)
    }

    pub fn add_comment(
        &self,
        report_id: &str,
        claims: &Claims,
        req: AddCommentRequest,
    ) -> Result<Comment, ChecklistError> {
        let (caller_id, caller_name) = caller(claims)?;
        let text = req.comment.trim();
        if text.is_empty() {
            return Err(ChecklistError::Validation("Comment text is required.".into()));
        }
        self.load_report(report_id)?;

        let comment = Comment {
            id: new_id(),
            report_id: report_id.to_string(),
            user_id: caller_id.to_string(),
            user_name: caller_name.to_string(),
            user_role: claims.role.as_str().to_string(),
            text: text.to_string(),
            is_internal: req.is_internal,
            created_at: Utc::now(),
        };
        self.store.insert_comment(&comment)?;
        info!(report_id, comment_id = %comment.id, "comment added");
        self.notifier.new_comment(report_id, &comment.id, caller_id);
        Ok(comment)
    }

    /// Take the report for review.
    pub fn assign(&self, id: &str, claims: &Claims) -> Result<(), ChecklistError> {
        self.transition(id, claims, |checklist, (caller_id, caller_name), _| {
            checklist.assigned_to_qs = Some(caller_id.to_string());
            checklist.assigned_to_qs_name = Some(caller_name.to_string());
            checklist.status = ChecklistStatus::UnderReview;
            Outcome { comment: None, decision: None }
        })
    }

    pub fn request_revision(
        &self,
        id: &str,
        claims: &Claims,
        req: RevisionRequest,
    ) -> Result<(), ChecklistError> {
        let text = req.comment_text();
        self.transition(id, claims, |checklist, _, _| {
            checklist.status = ChecklistStatus::RevisionRequested;
            Outcome {
                comment: Some(text),
                decision: Some(ChecklistStatus::RevisionRequested.as_str()),
            }
        })
    }

    pub fn approve(
        &self,
        id: &str,
        claims: &Claims,
        req: ApproveRequest,
    ) -> Result<(), ChecklistError> {
        let comment = non_blank(req.notes.as_deref()).map(|notes| format!("Approved: {notes}"));
        self.transition(id, claims, |checklist, (caller_id, _), now| {
            checklist.status = ChecklistStatus::Approved;
            checklist.reviewed_at = Some(now);
            checklist.reviewed_by = Some(caller_id.to_string());
            Outcome {
                comment,
                decision: Some(ChecklistStatus::Approved.as_str()),
            }
        })
    }

    pub fn reject(
        &self,
        id: &str,
        claims: &Claims,
        req: RejectRequest,
    ) -> Result<(), ChecklistError> {
        let reason = req.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ChecklistError::Validation("Rejection reason is required.".into()));
        }
        self.transition(id, claims, |checklist, (caller_id, _), now| {
            checklist.status = ChecklistStatus::Rejected;
            checklist.reviewed_at = Some(now);
            checklist.reviewed_by = Some(caller_id.to_string());
            Outcome {
                comment: Some(format!("Rejected: {reason}")),
                decision: Some(ChecklistStatus::Rejected.as_str()),
            }
        })
    }

    // =======================================================================
    // Internals
    // =======================================================================

    /// Shared path of every review action: authenticate, load, check the
    /// report is open and not locked by someone else, apply, commit the row
    /// together with any comment, then broadcast.
    fn transition<F>(&self, id: &str, claims: &Claims, apply: F) -> Result<(), ChecklistError>
    where
        F: FnOnce(&mut Checklist, (&str, &str), DateTime<Utc>) -> Outcome,
    {
        let (caller_id, caller_name) = caller(claims)?;
        let _guard = self.write_guard()?;
        let now = Utc::now();
        let mut checklist = self.load_report(id)?;
        if checklist.status.is_final() {
            return Err(ChecklistError::Validation("Report is already finalised".into()));
        }
        ensure_not_locked(&checklist, caller_id, now)?;

        let old_status = checklist.status;
        let outcome = apply(&mut checklist, (caller_id, caller_name), now);
        clear_expired_lock(&mut checklist, now);
        checklist.updated_at = now;

        let comment = outcome.comment.map(|text| Comment {
            id: new_id(),
            report_id: id.to_string(),
            user_id: caller_id.to_string(),
            user_name: caller_name.to_string(),
            user_role: claims.role.as_str().to_string(),
            text,
            is_internal: false,
            created_at: now,
        });
        self.store.save(&checklist, comment.as_ref())?;

        let new_status = checklist.status;
        info!(id, user = caller_id, from = %old_status, to = %new_status, "report transition");
        self.notifier
            .report_status_changed(id, old_status.as_str(), new_status.as_str());
        if let Some(c) = &comment {
            self.notifier.new_comment(id, &c.id, caller_id);
        }
        if let Some(decision) = outcome.decision {
            self.notifier.decision_made(id, decision, caller_id);
        }
        Ok(())
    }

    fn load_report(&self, id: &str) -> Result<Checklist, ChecklistError> {
        self.store
            .get(id)?
            .ok_or_else(|| ChecklistError::NotFound(format!("Report with ID {id} not found")))
    }

    fn queue(
        &self,
        statuses: &[ChecklistStatus],
        order: QueueOrder,
        page: &PageParams,
    ) -> Result<Page<ChecklistView>, ChecklistError> {
        let (items, total) = self.store.list_by_status(statuses, order, page)?;
        Ok(Page::new(self.views(items)?, total, page))
    }

    fn write_guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, ChecklistError> {
        self.write_lock
            .lock()
            .map_err(|_| ChecklistError::Internal("checklist write lock poisoned".into()))
    }

    fn view(&self, checklist: Checklist) -> Result<ChecklistView, ChecklistError> {
        Ok(self.views(vec![checklist])?.remove(0))
    }

    /// Attach the resolved RM to each checklist, with one directory lookup.
    fn views(&self, checklists: Vec<Checklist>) -> Result<Vec<ChecklistView>, ChecklistError> {
        let mut ids: Vec<String> = checklists
            .iter()
            .filter_map(|c| c.assigned_to_rm.clone())
            .collect();
        ids.sort();
        ids.dedup();
        let rms: HashMap<String, UserRef> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.users
                .lookup(&ids)
                .map_err(|e| ChecklistError::Storage(format!("user lookup: {e}")))?
                .into_iter()
                .map(|u| (u.id.clone(), u))
                .collect()
        };
        let now = Utc::now();
        Ok(checklists
            .into_iter()
            .map(|c| {
                let rm = c.assigned_to_rm.as_ref().and_then(|id| rms.get(id).cloned());
                ChecklistView::new(c, rm, now)
            })
            .collect())
    }
}

fn caller(claims: &Claims) -> Result<(&str, &str), ChecklistError> {
    claims
        .identity()
        .map_err(|_| ChecklistError::Unauthorized("User not authenticated".into()))
}

fn validate(req: &ChecklistRequest) -> Result<(), ChecklistError> {
    let missing = req.missing_fields();
    if missing.is_empty() {
        return Ok(());
    }
    Err(ChecklistError::Validation(format!(
        "Please fill all required fields. Missing: {}",
        missing.join(", ")
    )))
}

fn parse_priority(raw: Option<&str>) -> Result<Option<Priority>, ChecklistError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map(Some).map_err(ChecklistError::Validation),
        None => Ok(None),
    }
}

fn non_blank(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn ensure_not_locked(
    checklist: &Checklist,
    caller_id: &str,
    now: DateTime<Utc>,
) -> Result<(), ChecklistError> {
    match checklist.active_lock(now) {
        Some(lock) if lock.locked_by_user_id != caller_id => Err(ChecklistError::Locked(format!(
            "Report is locked by {} until {}",
            lock.locked_by_user_name,
            lock.expires_at.to_rfc3339()
        ))),
        _ => Ok(()),
    }
}

fn clear_expired_lock(checklist: &mut Checklist, now: DateTime<Utc>) {
    if checklist.lock.as_ref().is_some_and(|l| !l.is_active(now)) {
        checklist.lock = None;
    }
}

/// Mean review turnaround in whole hours, e.g. `"3h"`.
fn average_response_time(intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> String {
    if intervals.is_empty() {
        return "0h".to_string();
    }
    let total_hours: f64 = intervals
        .iter()
        .map(|(submitted, reviewed)| (*reviewed - *submitted).num_milliseconds() as f64 / 3_600_000.0)
        .sum();
    let mean = total_hours / intervals.len() as f64;
    format!("{}h", mean.round() as i64)
}
