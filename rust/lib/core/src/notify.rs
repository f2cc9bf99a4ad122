/// Sink for workflow events.
///
/// The checklist engine calls this after every committed transition. The
/// real-time hub implements it; tests and headless tools use [`NoopNotifier`].
/// Calls must not block beyond handing the event to connected receivers.
pub trait Notifier: Send + Sync {
    /// A report moved from one status to another. Goes to every connection.
    fn report_status_changed(&self, report_id: &str, old_status: &str, new_status: &str);

    /// A comment was appended to a report. Goes to group `report-<id>`.
    fn new_comment(&self, report_id: &str, comment_id: &str, user_id: &str);

    /// A reviewer decided on a report. Goes to group `report-<id>`.
    fn decision_made(&self, report_id: &str, decision: &str, qs_id: &str);
}

/// Discards every event.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn report_status_changed(&self, _report_id: &str, _old_status: &str, _new_status: &str) {}

    fn new_comment(&self, _report_id: &str, _comment_id: &str, _user_id: &str) {}

    fn decision_made(&self, _report_id: &str, _decision: &str, _qs_id: &str) {}
}
