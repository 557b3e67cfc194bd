use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::complaint::ComplaintId;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StatusUpdate,
    Escalation,
    Assignment,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusUpdate => "status_update",
            Self::Escalation => "escalation",
            Self::Assignment => "assignment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "status_update" => Some(Self::StatusUpdate),
            "escalation" => Some(Self::Escalation),
            "assignment" => Some(Self::Assignment),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    /// `None` addresses a system-wide notification.
    pub recipient: Option<UserId>,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub complaint_id: ComplaintId,
    pub recipient: Option<UserId>,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_draft(
        id: NotificationId,
        complaint_id: ComplaintId,
        draft: NotificationDraft,
    ) -> Self {
        Self {
            id,
            complaint_id,
            recipient: draft.recipient,
            kind: draft.kind,
            message: draft.message,
            read: false,
            created_at: draft.created_at,
        }
    }
}
