mod checklist;
mod comment;
mod site_visit;
mod status;

pub use checklist::{
    Checklist, ChecklistRequest, ChecklistView, DocumentCategory, DocumentItem, LockHolder,
    LockRequest, ReportLock,
};
pub use comment::{
    AddCommentRequest, ApproveRequest, Comment, DashboardStats, RejectRequest, RevisionRequest,
};
pub use site_visit::{DocumentsSubmitted, SiteVisitForm};
pub use status::{ChecklistStatus, Priority};
