use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use grievance_core::domain::category::{Category, CategoryId};
use grievance_core::domain::change::ComplaintChange;
use grievance_core::domain::complaint::{Complaint, ComplaintId};
use grievance_core::domain::notification::{Notification, NotificationId};
use grievance_core::domain::rule::EscalationRule;
use grievance_core::domain::timeline::{TimelineDraft, TimelineEntry};
use grievance_core::domain::user::{Role, User, UserId};

mod codec;
pub mod complaint;
pub mod directory;
pub mod memory;
pub mod session;

pub use complaint::SqlComplaintStore;
pub use directory::SqlReferenceDirectory;
pub use memory::{InMemoryComplaintStore, InMemoryDirectory};
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("complaint {0} changed since it was read")]
    Conflict(ComplaintId),
}

/// What a committed change wrote, with store-assigned ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedChange {
    pub complaint: Complaint,
    pub timeline_entry: TimelineEntry,
    pub notifications: Vec<Notification>,
}

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    async fn find_by_id(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError>;

    /// Complaints the escalation sweep considers: not resolved, rejected or escalated.
    async fn list_sweep_candidates(&self) -> Result<Vec<Complaint>, RepositoryError>;

    async fn insert_submission(
        &self,
        complaint: Complaint,
        first_entry: TimelineDraft,
    ) -> Result<(Complaint, TimelineEntry), RepositoryError>;

    /// Applies the whole change or nothing. Fails with [`RepositoryError::Conflict`]
    /// when the stored version or status no longer match the change's expectations.
    async fn commit_change(
        &self,
        change: ComplaintChange,
    ) -> Result<CommittedChange, RepositoryError>;

    /// Entries ordered by `created_at`, then insertion order.
    async fn list_timeline(
        &self,
        complaint_id: &ComplaintId,
    ) -> Result<Vec<TimelineEntry>, RepositoryError>;

    /// Newest first.
    async fn list_notifications_for(
        &self,
        recipient: &UserId,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError>;

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ReferenceDirectory: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    /// Ordered by user id.
    async fn list_active_users_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError>;

    async fn list_escalation_rules(&self) -> Result<Vec<EscalationRule>, RepositoryError>;

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// The user behind an unexpired session token.
    async fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError>;
}
