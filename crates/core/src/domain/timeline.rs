use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::complaint::{ComplaintId, ComplaintStatus};
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineEntryId(pub i64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

/// A timeline entry before the store has assigned it an id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDraft {
    pub status: ComplaintStatus,
    pub comment: Option<String>,
    /// `None` for system-generated entries.
    pub author: Option<UserId>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: TimelineEntryId,
    pub complaint_id: ComplaintId,
    pub status: ComplaintStatus,
    pub comment: Option<String>,
    pub author: Option<UserId>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

impl TimelineEntry {
    pub fn from_draft(id: TimelineEntryId, complaint_id: ComplaintId, draft: TimelineDraft) -> Self {
        Self {
            id,
            complaint_id,
            status: draft.status,
            comment: draft.comment,
            author: draft.author,
            visibility: draft.visibility,
            created_at: draft.created_at,
        }
    }
}
