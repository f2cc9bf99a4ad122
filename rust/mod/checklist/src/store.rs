use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use geobuild_core::{sortable_ts, PageParams};
use geobuild_sql::{Row, SQLStore, Statement, Value};

use crate::error::ChecklistError;
use crate::model::{Checklist, ChecklistStatus, Comment};

/// SQL schema. The full record lives in `data`; the other columns exist so
/// the review queues and dashboard can filter and sort in SQL.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checklists (
    id             TEXT PRIMARY KEY,
    dcl_no         TEXT NOT NULL UNIQUE,
    data           TEXT NOT NULL,
    status         TEXT NOT NULL,
    priority       TEXT,
    assigned_to_qs TEXT,
    submitted_at   TEXT,
    reviewed_at    TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_checklists_status ON checklists(status);
CREATE INDEX IF NOT EXISTS idx_checklists_created_at ON checklists(created_at);
CREATE INDEX IF NOT EXISTS idx_checklists_assigned_to_qs ON checklists(assigned_to_qs);

CREATE TABLE IF NOT EXISTS comments (
    id          TEXT PRIMARY KEY,
    report_id   TEXT NOT NULL REFERENCES checklists(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    user_name   TEXT NOT NULL,
    user_role   TEXT NOT NULL,
    text        TEXT NOT NULL,
    is_internal INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comments_report ON comments(report_id, created_at);

CREATE TABLE IF NOT EXISTS sequences (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
";

/// Raise the report-number sequence to at least the highest `CRN-` suffix
/// already stored. Safe to run on every start.
const SEED_CRN: &str = "
INSERT INTO sequences (name, value)
SELECT 'crn', COALESCE(MAX(CAST(SUBSTR(dcl_no, 5) AS INTEGER)), 0)
FROM checklists WHERE dcl_no LIKE 'CRN-%'
ON CONFLICT(name) DO UPDATE SET value = MAX(value, excluded.value);
";

/// Issue the next report number in one statement.
const NEXT_CRN: &str = "INSERT INTO sequences (name, value) VALUES ('crn', 1) \
                        ON CONFLICT(name) DO UPDATE SET value = value + 1 RETURNING value";

const COMMENT_COLUMNS: &str =
    "id, report_id, user_id, user_name, user_role, text, is_internal, created_at";

/// Sort order of a review queue.
#[derive(Debug, Clone, Copy)]
pub enum QueueOrder {
    /// Most recently submitted first; never-submitted rows by creation time.
    Submitted,
    /// Most recently touched first.
    Updated,
}

impl QueueOrder {
    fn sql(&self) -> &'static str {
        match self {
            Self::Submitted => "COALESCE(submitted_at, created_at) DESC",
            Self::Updated => "updated_at DESC",
        }
    }
}

/// Raw dashboard counters, computed in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub completed_since: i64,
    pub critical: i64,
    pub mine_active: i64,
    pub overdue: i64,
}

/// Persistent storage for checklists and their comments, backed by SQLStore.
pub struct ChecklistStore {
    db: Arc<dyn SQLStore>,
}

impl ChecklistStore {
    /// Create the store, initialise the schema, rewrite legacy status
    /// spellings and seed the report-number sequence.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ChecklistError> {
        db.exec_batch(SCHEMA)
            .map_err(|e| ChecklistError::Storage(format!("checklist schema init: {e}")))?;
        let store = Self { db };
        store.normalize_statuses()?;
        store
            .db
            .exec_batch(SEED_CRN)
            .map_err(|e| ChecklistError::Storage(format!("seed report sequence: {e}")))?;
        Ok(store)
    }

    fn normalize_statuses(&self) -> Result<(), ChecklistError> {
        let rows = self
            .db
            .query("SELECT DISTINCT status FROM checklists", &[])?;
        for raw in rows.iter().filter_map(|r| r.get_str("status")) {
            let Ok(status) = raw.parse::<ChecklistStatus>() else {
                continue;
            };
            if status.as_str() == raw {
                continue;
            }
            let n = self.db.exec(
                "UPDATE checklists SET status = ?1, data = json_set(data, '$.status', ?1) \
                 WHERE status = ?2",
                &[Value::from(status.as_str()), Value::from(raw)],
            )?;
            info!(from = raw, to = %status, rows = n, "normalized checklist status");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Checklists
    // -----------------------------------------------------------------------

    /// Next report number, e.g. `CRN-042`. Atomic across concurrent callers.
    pub fn next_report_number(&self) -> Result<String, ChecklistError> {
        let rows = self.db.query(NEXT_CRN, &[])?;
        let n = rows
            .first()
            .and_then(|r| r.get_i64("value"))
            .ok_or_else(|| ChecklistError::Internal("report sequence returned nothing".into()))?;
        Ok(format!("CRN-{n:03}"))
    }

    pub fn insert(&self, checklist: &Checklist) -> Result<(), ChecklistError> {
        let data = serde_json::to_string(checklist)?;
        self.db
            .exec(
                "INSERT INTO checklists (id, dcl_no, data, status, priority, assigned_to_qs, \
                 submitted_at, reviewed_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                &[
                    Value::from(checklist.id.as_str()),
                    Value::from(checklist.dcl_no.as_str()),
                    Value::from(data),
                    Value::from(checklist.status.as_str()),
                    Value::from(checklist.priority.map(|p| p.as_str())),
                    Value::from(checklist.assigned_to_qs.clone()),
                    Value::from(checklist.submitted_at.as_ref().map(sortable_ts)),
                    Value::from(checklist.reviewed_at.as_ref().map(sortable_ts)),
                    Value::from(sortable_ts(&checklist.created_at)),
                    Value::from(sortable_ts(&checklist.updated_at)),
                ],
            )
            .map_err(|e| match e.unique_violation() {
                Some("checklists.dcl_no") => {
                    ChecklistError::Conflict(format!("Report number {} already exists", checklist.dcl_no))
                }
                _ => ChecklistError::from(e),
            })?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Checklist>, ChecklistError> {
        let rows = self.db.query(
            "SELECT data FROM checklists WHERE id = ?1",
            &[Value::from(id)],
        )?;
        rows.first().map(row_to_checklist).transpose()
    }

    /// Full-row replacement, for use inside [`SQLStore::transaction`].
    pub fn update_statement(&self, checklist: &Checklist) -> Result<Statement, ChecklistError> {
        let data = serde_json::to_string(checklist)?;
        Ok(Statement::new(
            "UPDATE checklists SET data = ?1, status = ?2, priority = ?3, assigned_to_qs = ?4, \
             submitted_at = ?5, reviewed_at = ?6, updated_at = ?7 WHERE id = ?8",
            vec![
                Value::from(data),
                Value::from(checklist.status.as_str()),
                Value::from(checklist.priority.map(|p| p.as_str())),
                Value::from(checklist.assigned_to_qs.clone()),
                Value::from(checklist.submitted_at.as_ref().map(sortable_ts)),
                Value::from(checklist.reviewed_at.as_ref().map(sortable_ts)),
                Value::from(sortable_ts(&checklist.updated_at)),
                Value::from(checklist.id.as_str()),
            ],
        ))
    }

    /// Save a checklist and, optionally, a comment on it. Both or neither.
    pub fn save(
        &self,
        checklist: &Checklist,
        comment: Option<&Comment>,
    ) -> Result<(), ChecklistError> {
        let mut statements = vec![self.update_statement(checklist)?];
        if let Some(c) = comment {
            statements.push(comment_statement(c));
        }
        let affected = self.db.transaction(&statements)?;
        if affected.first() == Some(&0) {
            return Err(ChecklistError::NotFound(format!(
                "Report with ID {} not found",
                checklist.id
            )));
        }
        Ok(())
    }

    /// Every checklist, newest first.
    pub fn list_all(&self) -> Result<Vec<Checklist>, ChecklistError> {
        let rows = self
            .db
            .query("SELECT data FROM checklists ORDER BY created_at DESC", &[])?;
        rows.iter().map(row_to_checklist).collect()
    }

    /// One page of checklists in any of `statuses`, plus the total count.
    pub fn list_by_status(
        &self,
        statuses: &[ChecklistStatus],
        order: QueueOrder,
        page: &PageParams,
    ) -> Result<(Vec<Checklist>, usize), ChecklistError> {
        let placeholders: Vec<String> = (1..=statuses.len()).map(|i| format!("?{i}")).collect();
        let in_clause = placeholders.join(", ");
        let mut params: Vec<Value> = statuses.iter().map(|s| Value::from(s.as_str())).collect();

        let count_rows = self.db.query(
            &format!("SELECT COUNT(*) AS cnt FROM checklists WHERE status IN ({in_clause})"),
            &params,
        )?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        let idx = params.len() + 1;
        params.push(Value::Integer(page.limit() as i64));
        params.push(Value::Integer(page.offset() as i64));
        let rows = self.db.query(
            &format!(
                "SELECT data FROM checklists WHERE status IN ({in_clause}) \
                 ORDER BY {} LIMIT ?{idx} OFFSET ?{}",
                order.sql(),
                idx + 1
            ),
            &params,
        )?;
        let items = rows.iter().map(row_to_checklist).collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    /// Reports under review by `qs_id`, most recently touched first.
    pub fn active_for_reviewer(&self, qs_id: &str) -> Result<Vec<Checklist>, ChecklistError> {
        let rows = self.db.query(
            "SELECT data FROM checklists WHERE assigned_to_qs = ?1 AND status = ?2 \
             ORDER BY updated_at DESC",
            &[
                Value::from(qs_id),
                Value::from(ChecklistStatus::UnderReview.as_str()),
            ],
        )?;
        rows.iter().map(row_to_checklist).collect()
    }

    /// Dashboard counters. `completed_since` counts approvals touched at or
    /// after `since`; `overdue` counts reviews untouched since `stale_before`.
    pub fn status_counts(
        &self,
        qs_id: &str,
        since: &DateTime<Utc>,
        stale_before: &DateTime<Utc>,
    ) -> Result<StatusCounts, ChecklistError> {
        let rows = self.db.query(
            "SELECT \
               COALESCE(SUM(CASE WHEN status IN ('submitted', 'pending_qs_review') THEN 1 ELSE 0 END), 0) AS pending, \
               COALESCE(SUM(CASE WHEN status = 'under_review' THEN 1 ELSE 0 END), 0) AS in_progress, \
               COALESCE(SUM(CASE WHEN status = 'approved' AND updated_at >= ?2 THEN 1 ELSE 0 END), 0) AS completed_since, \
               COALESCE(SUM(CASE WHEN priority IN ('high', 'critical') THEN 1 ELSE 0 END), 0) AS critical, \
               COALESCE(SUM(CASE WHEN status = 'under_review' AND assigned_to_qs = ?1 THEN 1 ELSE 0 END), 0) AS mine_active, \
               COALESCE(SUM(CASE WHEN status = 'under_review' AND updated_at < ?3 THEN 1 ELSE 0 END), 0) AS overdue \
             FROM checklists",
            &[
                Value::from(qs_id),
                Value::from(sortable_ts(since)),
                Value::from(sortable_ts(stale_before)),
            ],
        )?;
        let Some(row) = rows.first() else {
            return Ok(StatusCounts::default());
        };
        let n = |name: &str| row.get_i64(name).unwrap_or(0);
        Ok(StatusCounts {
            pending: n("pending"),
            in_progress: n("in_progress"),
            completed_since: n("completed_since"),
            critical: n("critical"),
            mine_active: n("mine_active"),
            overdue: n("overdue"),
        })
    }

    /// `(submitted_at, reviewed_at)` of every approved report that has both.
    pub fn approval_intervals(
        &self,
    ) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, ChecklistError> {
        let rows = self.db.query(
            "SELECT submitted_at, reviewed_at FROM checklists \
             WHERE status = 'approved' AND submitted_at IS NOT NULL AND reviewed_at IS NOT NULL",
            &[],
        )?;
        rows.iter()
            .map(|r| {
                let submitted = parse_ts(r.get_str("submitted_at").unwrap_or_default())?;
                let reviewed = parse_ts(r.get_str("reviewed_at").unwrap_or_default())?;
                Ok((submitted, reviewed))
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub fn insert_comment(&self, comment: &Comment) -> Result<(), ChecklistError> {
        let statement = comment_statement(comment);
        self.db.exec(&statement.sql, &statement.params)?;
        Ok(())
    }

    /// Comments on a report, newest first.
    pub fn comments_for(&self, report_id: &str) -> Result<Vec<Comment>, ChecklistError> {
        let rows = self.db.query(
            &format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE report_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC"
            ),
            &[Value::from(report_id)],
        )?;
        rows.iter().map(row_to_comment).collect()
    }
}

fn comment_statement(comment: &Comment) -> Statement {
    Statement::new(
        format!("INSERT INTO comments ({COMMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        vec![
            Value::from(comment.id.as_str()),
            Value::from(comment.report_id.as_str()),
            Value::from(comment.user_id.as_str()),
            Value::from(comment.user_name.as_str()),
            Value::from(comment.user_role.as_str()),
            Value::from(comment.text.as_str()),
            Value::from(comment.is_internal),
            Value::from(sortable_ts(&comment.created_at)),
        ],
    )
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, ChecklistError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ChecklistError::Internal(format!("bad timestamp {raw:?}: {e}")))
}

fn row_to_checklist(row: &Row) -> Result<Checklist, ChecklistError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ChecklistError::Internal("checklists.data missing".into()))?;
    Ok(serde_json::from_str(data)?)
}

fn row_to_comment(row: &Row) -> Result<Comment, ChecklistError> {
    let text = |name: &str| -> Result<String, ChecklistError> {
        row.get_str(name)
            .map(str::to_string)
            .ok_or_else(|| ChecklistError::Internal(format!("comments.{name} missing")))
    };
    Ok(Comment {
        id: text("id")?,
        report_id: text("report_id")?,
        user_id: text("user_id")?,
        user_name: text("user_name")?,
        user_role: text("user_role")?,
        text: text("text")?,
        is_internal: row.get_i64("is_internal").unwrap_or(0) != 0,
        created_at: parse_ts(&text("created_at")?)?,
    })
}

#[cfg(test)]
pub(crate) fn test_store() -> ChecklistStore {
    let db = Arc::new(geobuild_sql::SqliteStore::open_in_memory().unwrap());
    ChecklistStore::new(db).unwrap()
}

#[cfg(test)]
pub(crate) fn sample_checklist(id: &str, dcl_no: &str) -> Checklist {
    let now = Utc::now();
    Checklist {
        id: id.into(),
        dcl_no: dcl_no.into(),
        customer_id: None,
        customer_number: "0001".into(),
        customer_name: "Jane Doe".into(),
        customer_email: None,
        project_name: "Villa".into(),
        ibps_no: "IB-1".into(),
        assigned_to_rm: Some("rm-1".into()),
        created_by: Some("rm-1".into()),
        documents: vec![],
        site_visit_form: None,
        status: ChecklistStatus::Pending,
        priority: None,
        assigned_to_qs: None,
        assigned_to_qs_name: None,
        submitted_at: None,
        reviewed_at: None,
        reviewed_by: None,
        lock: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geobuild_core::new_id;

    fn comment(report_id: &str, text: &str) -> Comment {
        Comment {
            id: new_id(),
            report_id: report_id.into(),
            user_id: "qs-1".into(),
            user_name: "Quinn".into(),
            user_role: "QS".into(),
            text: text.into(),
            is_internal: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn report_numbers_count_up() {
        let store = test_store();
        assert_eq!(store.next_report_number().unwrap(), "CRN-001");
        assert_eq!(store.next_report_number().unwrap(), "CRN-002");
    }

    #[test]
    fn sequence_is_seeded_from_existing_rows() {
        let db: Arc<dyn SQLStore> = Arc::new(geobuild_sql::SqliteStore::open_in_memory().unwrap());
        let store = ChecklistStore::new(db.clone()).unwrap();
        store.insert(&sample_checklist("a", "CRN-041")).unwrap();
        store.insert(&sample_checklist("b", "LEGACY-9")).unwrap();
        db.exec("DELETE FROM sequences", &[]).unwrap();

        let reopened = ChecklistStore::new(db).unwrap();
        assert_eq!(reopened.next_report_number().unwrap(), "CRN-042");
    }

    #[test]
    fn duplicate_report_number_is_conflict() {
        let store = test_store();
        store.insert(&sample_checklist("a", "CRN-001")).unwrap();
        assert!(matches!(
            store.insert(&sample_checklist("b", "CRN-001")),
            Err(ChecklistError::Conflict(_))
        ));
    }

    #[test]
    fn legacy_statuses_are_rewritten_on_open() {
        let db: Arc<dyn SQLStore> = Arc::new(geobuild_sql::SqliteStore::open_in_memory().unwrap());
        let store = ChecklistStore::new(db.clone()).unwrap();
        store.insert(&sample_checklist("a", "CRN-001")).unwrap();
        db.exec(
            "UPDATE checklists SET status = 'UnderReview', \
             data = json_set(data, '$.status', 'UnderReview')",
            &[],
        )
        .unwrap();

        let store = ChecklistStore::new(db.clone()).unwrap();
        let rows = db.query("SELECT status FROM checklists", &[]).unwrap();
        assert_eq!(rows[0].get_str("status"), Some("under_review"));
        assert_eq!(
            store.get("a").unwrap().unwrap().status,
            ChecklistStatus::UnderReview
        );
    }

    #[test]
    fn save_with_comment_is_atomic() {
        let store = test_store();
        let mut c = sample_checklist("a", "CRN-001");
        store.insert(&c).unwrap();

        c.status = ChecklistStatus::Rejected;
        store.save(&c, Some(&comment("a", "Rejected: blurry"))).unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().status, ChecklistStatus::Rejected);
        assert_eq!(store.comments_for("a").unwrap().len(), 1);

        // A comment pointing at a missing report fails the FK and takes the
        // status change down with it.
        c.status = ChecklistStatus::Approved;
        assert!(store.save(&c, Some(&comment("missing", "x"))).is_err());
        assert_eq!(store.get("a").unwrap().unwrap().status, ChecklistStatus::Rejected);
    }

    #[test]
    fn comments_newest_first_and_internal_flag_round_trips() {
        let store = test_store();
        store.insert(&sample_checklist("a", "CRN-001")).unwrap();
        store.insert_comment(&comment("a", "first")).unwrap();
        let mut public = comment("a", "second");
        public.is_internal = false;
        store.insert_comment(&public).unwrap();

        let comments = store.comments_for("a").unwrap();
        assert_eq!(comments[0].text, "second");
        assert!(!comments[0].is_internal);
        assert!(comments[1].is_internal);
    }

    #[test]
    fn queue_paging_and_counts() {
        let store = test_store();
        for i in 0..3 {
            let mut c = sample_checklist(&format!("p{i}"), &format!("CRN-10{i}"));
            c.status = ChecklistStatus::PendingQsReview;
            store.insert(&c).unwrap();
        }
        let mut c = sample_checklist("s", "CRN-200");
        c.status = ChecklistStatus::Submitted;
        c.priority = Some(crate::model::Priority::Critical);
        store.insert(&c).unwrap();

        let (items, total) = store
            .list_by_status(
                &[ChecklistStatus::Submitted, ChecklistStatus::PendingQsReview],
                QueueOrder::Submitted,
                &PageParams { page: 2, page_size: 3 },
            )
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(items.len(), 1);

        let now = Utc::now();
        let counts = store.status_counts("qs-1", &now, &now).unwrap();
        assert_eq!(counts.pending, 4);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.in_progress, 0);
    }
}
