#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use grievance_core::domain::category::{Category, CategoryId};
use grievance_core::domain::change::ComplaintChange;
use grievance_core::domain::complaint::{
    AnonymousContact, Complaint, ComplaintId, Priority, Submitter,
};
use grievance_core::domain::notification::{Notification, NotificationId};
use grievance_core::domain::rule::{EscalationRole, EscalationRule, RuleId};
use grievance_core::domain::timeline::{TimelineDraft, TimelineEntry};
use grievance_core::domain::user::{Actor, Role, User, UserId};
use grievance_core::escalation::{FirstCandidateSelector, TargetSelector};
use grievance_core::lifecycle::NewComplaint;
use grievance_db::{
    CommittedChange, ComplaintStore, InMemoryComplaintStore, InMemoryDirectory, RepositoryError,
};
use grievance_workflow::{FixedClock, RecordingDispatcher, WorkflowService, WorkflowSettings};

pub const TECHNICAL: CategoryId = CategoryId(1);
pub const FACILITIES: CategoryId = CategoryId(2);
pub const RETIRED: CategoryId = CategoryId(9);

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// Wraps the in-memory store with switchable faults.
#[derive(Default)]
pub struct ScriptedStore {
    inner: InMemoryComplaintStore,
    failing_commits: Mutex<HashSet<String>>,
    conflicts_remaining: AtomicUsize,
    stale_candidates: Mutex<Option<Vec<Complaint>>>,
    lookup_delay: Mutex<Option<Duration>>,
}

impl ScriptedStore {
    pub fn fail_commits_for(&self, id: &ComplaintId) {
        self.failing_commits.lock().unwrap().insert(id.0.clone());
    }

    pub fn conflict_next_commits(&self, count: usize) {
        self.conflicts_remaining.store(count, Ordering::SeqCst);
    }

    pub fn serve_stale_candidates(&self, candidates: Vec<Complaint>) {
        *self.stale_candidates.lock().unwrap() = Some(candidates);
    }

    pub fn delay_lookups(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl ComplaintStore for ScriptedStore {
    async fn find_by_id(&self, id: &ComplaintId) -> Result<Option<Complaint>, RepositoryError> {
        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.find_by_id(id).await
    }

    async fn list_sweep_candidates(&self) -> Result<Vec<Complaint>, RepositoryError> {
        let stale = self.stale_candidates.lock().unwrap().clone();
        match stale {
            Some(candidates) => Ok(candidates),
            None => self.inner.list_sweep_candidates().await,
        }
    }

    async fn insert_submission(
        &self,
        complaint: Complaint,
        first_entry: TimelineDraft,
    ) -> Result<(Complaint, TimelineEntry), RepositoryError> {
        self.inner.insert_submission(complaint, first_entry).await
    }

    async fn commit_change(
        &self,
        change: ComplaintChange,
    ) -> Result<CommittedChange, RepositoryError> {
        if self.failing_commits.lock().unwrap().contains(&change.complaint.id.0) {
            return Err(RepositoryError::Decode("simulated write failure".to_owned()));
        }
        let conflict = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if conflict {
            return Err(RepositoryError::Conflict(change.complaint.id));
        }
        self.inner.commit_change(change).await
    }

    async fn list_timeline(
        &self,
        complaint_id: &ComplaintId,
    ) -> Result<Vec<TimelineEntry>, RepositoryError> {
        self.inner.list_timeline(complaint_id).await
    }

    async fn list_notifications_for(
        &self,
        recipient: &UserId,
    ) -> Result<Vec<Notification>, RepositoryError> {
        self.inner.list_notifications_for(recipient).await
    }

    async fn find_notification(
        &self,
        id: NotificationId,
    ) -> Result<Option<Notification>, RepositoryError> {
        self.inner.find_notification(id).await
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<bool, RepositoryError> {
        self.inner.mark_notification_read(id).await
    }
}

pub struct Harness {
    pub service: WorkflowService,
    pub store: Arc<ScriptedStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_selector(Arc::new(FirstCandidateSelector)).await
    }

    pub async fn with_selector(selector: Arc<dyn TargetSelector>) -> Self {
        let store = Arc::new(ScriptedStore::default());
        let directory = Arc::new(InMemoryDirectory::new());
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let clock = Arc::new(FixedClock::new(t0()));

        for (id, role) in [
            ("student-u1", Role::User),
            ("student-u2", Role::User),
            ("admin-a1", Role::Admin),
            ("admin-a2", Role::Admin),
            ("dean-s1", Role::SuperAdmin),
        ] {
            directory.upsert_user(user(id, role, true)).await;
        }
        directory
            .upsert_category(Category { id: TECHNICAL, name: "Technical".to_owned(), active: true })
            .await;
        directory
            .upsert_category(Category { id: FACILITIES, name: "Facilities".to_owned(), active: true })
            .await;
        directory
            .upsert_category(Category { id: RETIRED, name: "Retired".to_owned(), active: false })
            .await;

        let service = WorkflowService::new(store.clone(), directory.clone(), dispatcher.clone())
            .with_clock(clock.clone())
            .with_selector(selector)
            .with_settings(WorkflowSettings {
                store_timeout: Duration::from_millis(200),
                ..WorkflowSettings::default()
            });

        Self { service, store, directory, dispatcher, clock }
    }

    pub async fn submit(&self, category: CategoryId, priority: Priority, owner: &str) -> Complaint {
        self.service
            .submit(draft(category, priority, registered(owner)))
            .await
            .expect("submission accepted")
            .value
            .complaint
    }

    pub async fn submit_anonymous(&self, category: CategoryId, priority: Priority) -> Complaint {
        let submitter = Submitter::Anonymous {
            contact: Some(AnonymousContact {
                name: None,
                email: Some("witness@example.org".to_owned()),
                phone: None,
            }),
        };
        self.service
            .submit(draft(category, priority, submitter))
            .await
            .expect("anonymous submission accepted")
            .value
            .complaint
    }
}

pub fn user(id: &str, role: Role, active: bool) -> User {
    User {
        id: UserId(id.to_owned()),
        name: format!("Name of {id}"),
        email: format!("{id}@example.edu"),
        role,
        active,
    }
}

pub fn actor(id: &str, role: Role) -> Actor {
    Actor::new(id, role)
}

pub fn admin() -> Actor {
    actor("admin-a1", Role::Admin)
}

pub fn registered(id: &str) -> Submitter {
    Submitter::Registered { user_id: UserId(id.to_owned()) }
}

pub fn draft(category: CategoryId, priority: Priority, submitter: Submitter) -> NewComplaint {
    NewComplaint {
        category_id: category,
        subject: "Projector in room 204 is broken".to_owned(),
        description: "The projector has not turned on since Monday.".to_owned(),
        priority,
        submitter,
        attachments: Vec::new(),
    }
}

pub fn rule(
    id: i64,
    category: Option<CategoryId>,
    priority: Option<Priority>,
    hours: u32,
    role: EscalationRole,
) -> EscalationRule {
    EscalationRule {
        id: RuleId(id),
        category_id: category,
        priority,
        hours_before_escalation: hours,
        escalate_to_role: role,
        active: true,
    }
}
