use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::category::CategoryId;
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComplaintId(pub String);

impl ComplaintId {
    /// Generates a human-readable identifier such as `CMP-20261014-5F3A9C01`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase();
        Self(format!("CMP-{}-{suffix}", now.format("%Y%m%d")))
    }
}

impl fmt::Display for ComplaintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    New,
    UnderReview,
    InProgress,
    Escalated,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 6] = [
        Self::New,
        Self::UnderReview,
        Self::InProgress,
        Self::Escalated,
        Self::Resolved,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::UnderReview => "under_review",
            Self::InProgress => "in_progress",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "under_review" => Some(Self::UnderReview),
            "in_progress" => Some(Self::InProgress),
            "escalated" => Some(Self::Escalated),
            "resolved" => Some(Self::Resolved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Label used in generated timeline comments and notification text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::UnderReview => "Under Review",
            Self::InProgress => "In Progress",
            Self::Escalated => "Escalated",
            Self::Resolved => "Resolved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected)
    }

    /// Statuses only staff may move a complaint into.
    pub fn is_staff_only(&self) -> bool {
        !matches!(self, Self::New)
    }

    /// Whether the auto-escalation sweep considers a complaint in this status.
    pub fn is_sweep_eligible(&self) -> bool {
        !matches!(self, Self::Resolved | Self::Rejected | Self::Escalated)
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousContact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Who filed a complaint. Contact details captured for an anonymous complaint never
/// make anyone its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submitter {
    Registered { user_id: UserId },
    Anonymous { contact: Option<AnonymousContact> },
}

impl Submitter {
    pub fn owner(&self) -> Option<&UserId> {
        match self {
            Self::Registered { user_id } => Some(user_id),
            Self::Anonymous { .. } => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    /// Storage key, assigned by the store on insert.
    pub row_id: i64,
    pub id: ComplaintId,
    pub category_id: CategoryId,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub submitter: Submitter,
    pub assigned_to: Option<UserId>,
    pub escalated_to: Option<UserId>,
    pub escalation_reason: Option<String>,
    pub resolution_details: Option<String>,
    pub attachments: Vec<AttachmentRef>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Complaint {
    pub fn owner(&self) -> Option<&UserId> {
        self.submitter.owner()
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.owner() == Some(user_id)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whole hours elapsed since submission.
    pub fn hours_open(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_hours().max(0)
    }
}
