use serde::{Deserialize, Serialize};

use crate::domain::complaint::{Complaint, ComplaintStatus};
use crate::domain::notification::NotificationDraft;
use crate::domain::timeline::TimelineDraft;

/// Everything one workflow step writes for a single complaint. Stores apply it as one
/// unit, and only while the stored complaint still has `expected_version` and
/// `expected_status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintChange {
    pub complaint: Complaint,
    pub expected_version: u32,
    pub expected_status: ComplaintStatus,
    pub timeline: TimelineDraft,
    pub notifications: Vec<NotificationDraft>,
}

impl ComplaintChange {
    pub fn status_changed(&self) -> bool {
        self.complaint.status != self.expected_status
    }
}
