use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use grievance_core::domain::category::{Category, CategoryId};
use grievance_core::domain::change::ComplaintChange;
use grievance_core::domain::complaint::{Complaint, ComplaintId};
use grievance_core::domain::notification::{Notification, NotificationId};
use grievance_core::domain::rule::EscalationRule;
use grievance_core::domain::timeline::{TimelineDraft, TimelineEntry, TimelineEntryId};
use grievance_core::domain::user::{Role, User, UserId};

use super::{
    CommittedChange, ComplaintStore, ReferenceDirectory, RepositoryError, SessionRepository,
};

#[derive(Default)]
struct ComplaintState {
    complaints: HashMap<String, Complaint>,
    timeline: Vec<TimelineEntry>,
    notifications: Vec<Notification>,
    next_row_id: i64,
}

impl ComplaintState {
    fn next_row_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }

    fn append_entry(&mut self, complaint_id: &ComplaintId, draft: TimelineDraft) -> TimelineEntry {
        let id = TimelineEntryId(self.timeline.len() as i64 + 1);
        let entry = TimelineEntry::from_draft(id, complaint_id.clone(), draft);
        self.timeline.push(entry.clone());
        entry
    }
}

/// One lock guards complaints, timeline and notifications so every check-then-write
/// is atomic.
#[derive(Default)]
pub struct InMemoryComplaintStore {
    state: RwLock<ComplaintState>,
}

impl InMemoryComplaintStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ComplaintStore for InMemoryComplaintStore {
    async fn find_by_id(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.complaints.get(&id.0).cloned())
    }

    async fn list_sweep_candidates(&self) -> Result<Vec<Complaint>, RepositoryError> {
        let state = self.state.read().await;
        let mut candidates: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|complaint| complaint.status.is_sweep_eligible())
            .cloned()
            .collect();
        candidates.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then(left.row_id.cmp(&right.row_id))
        });
        Ok(candidates)
    }

    async fn insert_submission(
        &self,
        mut complaint: Complaint,
        first_entry: TimelineDraft,
    ) -> Result<(Complaint, TimelineEntry), RepositoryError> {
        let mut state = self.state.write().await;
        if state.complaints.contains_key(&complaint.id.0) {
            return Err(RepositoryError::Decode(format!(
                "complaint {} already exists",
                complaint.id
            )));
        }

        complaint.row_id = state.next_row_id();
        let entry = state.append_entry(&complaint.id, first_entry);
        state.complaints.insert(complaint.id.0.clone(), complaint.clone());
        Ok((complaint, entry))
    }

    async fn commit_change(
        &self,
        change: ComplaintChange,
    ) -> Result<CommittedChange, RepositoryError> {
        let ComplaintChange { mut complaint, expected_version, expected_status, timeline, notifications } =
            change;

        let mut state = self.state.write().await;
        let Some(stored) = state.complaints.get(&complaint.id.0) else {
            return Err(RepositoryError::Conflict(complaint.id));
        };
        if stored.version != expected_version || stored.status != expected_status {
            return Err(RepositoryError::Conflict(complaint.id));
        }

        complaint.row_id = stored.row_id;
        complaint.attachments = stored.attachments.clone();
        let timeline_entry = state.append_entry(&complaint.id, timeline);

        let mut created = Vec::with_capacity(notifications.len());
        for draft in notifications {
            let id = NotificationId(state.notifications.len() as i64 + 1);
            let notification = Notification::from_draft(id, complaint.id.clone(), draft);
            state.notifications.push(notification.clone());
            created.push(notification);
        }

        state.complaints.insert(complaint.id.0.clone(), complaint.clone());
        Ok(CommittedChange { complaint, timeline_entry, notifications: created })
    }

    async fn list_timeline(
        &self,
        complaint_id: &ComplaintId,
    ) -> Result<Vec<TimelineEntry>, RepositoryError> {
        let state = self.state.read().await;
        let mut entries: Vec<TimelineEntry> = state
            .timeline
            .iter()
            .filter(|entry| entry.complaint_id == *complaint_id)
            .cloned()
            .collect();
        entries.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then(left.id.cmp(&right.id))
        });
        Ok(entries)
    }

    async fn list_notifications_for(
        &self,
        recipient: &UserId,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let state = self.state.read().await;
        let mut inbox: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|notification| notification.recipient.as_ref() == Some(recipient))
            .cloned()
            .collect();
        inbox.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then(right.id.cmp(&left.id))
        });
        Ok(inbox)
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.notifications.iter().find(|notification| notification.id == id).cloned())
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.notifications.iter_mut().find(|notification| notification.id == id) {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Clone, Debug)]
struct SessionRecord {
    user_id: UserId,
    expires_at: Option<DateTime<Utc>>,
}

/// Users, categories, rules and sessions held in memory for tests and demos.
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, User>>,
    categories: RwLock<HashMap<i64, Category>>,
    rules: RwLock<Vec<EscalationRule>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_user(&self, user: User) {
        self.users.write().await.insert(user.id.0.clone(), user);
    }

    pub async fn upsert_category(&self, category: Category) {
        self.categories.write().await.insert(category.id.0, category);
    }

    pub async fn replace_rules(&self, rules: Vec<EscalationRule>) {
        *self.rules.write().await = rules;
    }

    pub async fn insert_session(
        &self,
        token: impl Into<String>,
        user_id: UserId,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.sessions.write().await.insert(token.into(), SessionRecord { user_id, expires_at });
    }
}

#[async_trait::async_trait]
impl ReferenceDirectory for InMemoryDirectory {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id.0).cloned())
    }

    async fn list_active_users_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut matching: Vec<User> =
            users.values().filter(|user| user.active && user.role == role).cloned().collect();
        matching.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(matching)
    }

    async fn list_escalation_rules(&self) -> Result<Vec<EscalationRule>, RepositoryError> {
        Ok(self.rules.read().await.clone())
    }

    async fn find_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.categories.read().await.get(&id.0).cloned())
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemoryDirectory {
    async fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepositoryError> {
        let record = self.sessions.read().await.get(token).cloned();
        let Some(record) = record.filter(|record| record.expires_at.map_or(true, |at| at > now))
        else {
            return Ok(None);
        };
        self.find_user(&record.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use grievance_core::domain::category::CategoryId;
    use grievance_core::domain::complaint::{
        Complaint, ComplaintId, ComplaintStatus, Priority, Submitter,
    };
    use grievance_core::domain::timeline::{TimelineDraft, Visibility};
    use grievance_core::domain::user::{Actor, Role, User, UserId};
    use grievance_core::lifecycle::{LifecycleMachine, TransitionRequest};

    use crate::repositories::{
        ComplaintStore, InMemoryComplaintStore, InMemoryDirectory, ReferenceDirectory,
        RepositoryError, SessionRepository,
    };

    fn complaint(id: &str) -> Complaint {
        let at = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        Complaint {
            row_id: 0,
            id: ComplaintId(id.to_string()),
            category_id: CategoryId(1),
            subject: "Noise".to_string(),
            description: "Construction at night".to_string(),
            priority: Priority::Medium,
            status: ComplaintStatus::New,
            submitter: Submitter::Registered { user_id: UserId("student-1".to_string()) },
            assigned_to: None,
            escalated_to: None,
            escalation_reason: None,
            resolution_details: None,
            attachments: Vec::new(),
            version: 1,
            created_at: at,
            updated_at: at,
            resolved_at: None,
        }
    }

    fn first_entry(complaint: &Complaint) -> TimelineDraft {
        TimelineDraft {
            status: ComplaintStatus::New,
            comment: Some("Complaint submitted".to_string()),
            author: complaint.owner().cloned(),
            visibility: Visibility::Public,
            created_at: complaint.created_at,
        }
    }

    #[tokio::test]
    async fn in_memory_store_detects_stale_writes() {
        let store = InMemoryComplaintStore::new();
        let draft = complaint("CMP-1");
        let (stored, _) =
            store.insert_submission(draft.clone(), first_entry(&draft)).await.expect("insert");
        let machine = LifecycleMachine::new();
        let admin = Actor::new("admin-1", Role::Admin);
        let now = stored.created_at + Duration::hours(1);

        let winner = machine
            .transition(&stored, &TransitionRequest::new(ComplaintStatus::InProgress), &admin, now)
            .expect("change");
        let loser = machine
            .transition(&stored, &TransitionRequest::new(ComplaintStatus::Rejected), &admin, now)
            .expect("change");

        let committed = store.commit_change(winner).await.expect("commit");
        assert_eq!(committed.complaint.row_id, stored.row_id);
        assert!(matches!(store.commit_change(loser).await, Err(RepositoryError::Conflict(_))));

        let timeline = store.list_timeline(&stored.id).await.expect("timeline");
        assert_eq!(timeline.len(), 2);
        assert_eq!(
            store.find_by_id(&stored.id).await.expect("find").map(|found| found.status),
            Some(ComplaintStatus::InProgress)
        );
    }

    #[tokio::test]
    async fn duplicate_submission_ids_are_rejected() {
        let store = InMemoryComplaintStore::new();
        let draft = complaint("CMP-dup");
        store.insert_submission(draft.clone(), first_entry(&draft)).await.expect("insert");

        assert!(store.insert_submission(draft.clone(), first_entry(&draft)).await.is_err());
    }

    #[tokio::test]
    async fn in_memory_directory_filters_roles_and_sessions() {
        let directory = InMemoryDirectory::new();
        for (id, role, active) in [
            ("sa-2", Role::SuperAdmin, true),
            ("sa-1", Role::SuperAdmin, true),
            ("sa-0", Role::SuperAdmin, false),
        ] {
            directory
                .upsert_user(User {
                    id: UserId(id.to_string()),
                    name: id.to_string(),
                    email: format!("{id}@example.edu"),
                    role,
                    active,
                })
                .await;
        }
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        directory.insert_session("tok-1", UserId("sa-1".to_string()), None).await;
        directory
            .insert_session("tok-2", UserId("sa-2".to_string()), Some(now - Duration::minutes(1)))
            .await;

        let supers = directory.list_active_users_by_role(Role::SuperAdmin).await.expect("list");
        let ids: Vec<_> = supers.iter().map(|user| user.id.0.as_str()).collect();
        assert_eq!(ids, vec!["sa-1", "sa-2"]);

        assert!(directory.find_session_user("tok-1", now).await.expect("lookup").is_some());
        assert!(directory.find_session_user("tok-2", now).await.expect("lookup").is_none());
    }
}
