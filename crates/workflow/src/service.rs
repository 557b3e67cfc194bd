use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use grievance_core::config::AppConfig;
use grievance_core::domain::change::ComplaintChange;
use grievance_core::domain::complaint::{Complaint, ComplaintId, ComplaintStatus, Submitter};
use grievance_core::domain::notification::{Notification, NotificationId};
use grievance_core::domain::timeline::{TimelineEntry, Visibility};
use grievance_core::domain::user::{Actor, UserId};
use grievance_core::errors::{ApplicationError, DomainError};
use grievance_core::escalation::{selector_for, RoundRobinSelector, TargetSelector};
use grievance_core::lifecycle::policy;
use grievance_core::lifecycle::{
    prepare_submission, LifecycleMachine, NewComplaint, SubmissionLimits, TransitionRequest,
};
use grievance_db::{CommittedChange, ComplaintStore, ReferenceDirectory, RepositoryError};

use crate::clock::{Clock, SystemClock};
use crate::dispatch::{DispatchError, NotificationDispatcher};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub store_timeout: Duration,
    pub max_conflict_retries: u32,
    pub submission: SubmissionLimits,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5_000),
            max_conflict_retries: 3,
            submission: SubmissionLimits::default(),
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store_timeout: Duration::from_millis(config.workflow.store_timeout_ms),
            max_conflict_retries: config.workflow.max_conflict_retries,
            submission: config.submission.limits(),
        }
    }
}

/// A successful result plus any delivery problems that happened after commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self { value, warnings: Vec::new() }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome { value: f(self.value), warnings: self.warnings }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmittedComplaint {
    pub complaint: Complaint,
    pub timeline_entry: TimelineEntry,
}

/// Runs lifecycle and escalation operations against the store. Rules are validated
/// by [`LifecycleMachine`] on a fresh read; the resulting change is committed
/// conditionally and re-planned when another writer got there first.
pub struct WorkflowService {
    pub(crate) store: Arc<dyn ComplaintStore>,
    pub(crate) directory: Arc<dyn ReferenceDirectory>,
    pub(crate) dispatcher: Arc<dyn NotificationDispatcher>,
    pub(crate) selector: Arc<dyn TargetSelector>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) machine: LifecycleMachine,
    pub(crate) settings: WorkflowSettings,
}

impl WorkflowService {
    pub fn new(
        store: Arc<dyn ComplaintStore>,
        directory: Arc<dyn ReferenceDirectory>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            directory,
            dispatcher,
            selector: Arc::new(RoundRobinSelector::new()),
            clock: Arc::new(SystemClock),
            machine: LifecycleMachine::new(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ComplaintStore>,
        directory: Arc<dyn ReferenceDirectory>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self::new(store, directory, dispatcher)
            .with_selector(selector_for(
                config.workflow.target_selection,
                config.workflow.selection_seed,
            ))
            .with_settings(WorkflowSettings::from_config(config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn TargetSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn submit(
        &self,
        draft: NewComplaint,
    ) -> Result<Outcome<SubmittedComplaint>, ApplicationError> {
        if let Submitter::Registered { user_id } = &draft.submitter {
            let submitter = self
                .guarded("find_user", self.directory.find_user(user_id))
                .await?
                .ok_or_else(|| {
                    ApplicationError::validation(format!("submitter `{user_id}` does not exist"))
                })?;
            policy::ensure_active(&Actor::from(&submitter))?;
        }

        let category =
            self.guarded("find_category", self.directory.find_category(draft.category_id)).await?;
        let prepared =
            prepare_submission(draft, category.as_ref(), &self.settings.submission, self.now())?;
        let (complaint, timeline_entry) = self
            .guarded(
                "insert_submission",
                self.store.insert_submission(prepared.complaint, prepared.timeline),
            )
            .await?;

        info!(
            event_name = "complaint.submit.accepted",
            complaint_id = %complaint.id,
            category_id = complaint.category_id.0,
            priority = complaint.priority.as_str(),
            anonymous = complaint.submitter.is_anonymous(),
            "complaint submitted"
        );
        Ok(Outcome::clean(SubmittedComplaint { complaint, timeline_entry }))
    }

    pub async fn transition(
        &self,
        id: &ComplaintId,
        request: TransitionRequest,
        actor: &Actor,
    ) -> Result<Outcome<Complaint>, ApplicationError> {
        let outcome = self
            .commit_with_retry(id, "transition", |complaint, now| {
                self.machine.transition(complaint, &request, actor, now)
            })
            .await?;

        info!(
            event_name = "complaint.transition.committed",
            complaint_id = %id,
            status = outcome.value.complaint.status.as_str(),
            version = outcome.value.complaint.version,
            actor = %actor.user_id,
            "complaint status changed"
        );
        Ok(outcome.map(|committed| committed.complaint))
    }

    pub async fn escalate(
        &self,
        id: &ComplaintId,
        escalated_to: &UserId,
        reason: &str,
        actor: &Actor,
    ) -> Result<Outcome<Complaint>, ApplicationError> {
        policy::ensure_staff(actor)?;
        let current = self.load(id).await?;
        self.machine.check_transition(id, current.status, ComplaintStatus::Escalated)?;
        let target = self
            .guarded("find_user", self.directory.find_user(escalated_to))
            .await?
            .ok_or_else(|| {
                ApplicationError::validation(format!(
                    "escalation target `{escalated_to}` does not exist"
                ))
            })?;

        let outcome = self
            .commit_with_retry(id, "escalate", |complaint, now| {
                self.machine.escalate(complaint, &target, reason, actor, now)
            })
            .await?;

        info!(
            event_name = "complaint.escalate.committed",
            complaint_id = %id,
            escalated_to = %target.id,
            actor = %actor.user_id,
            "complaint escalated manually"
        );
        Ok(outcome.map(|committed| committed.complaint))
    }

    pub async fn assign(
        &self,
        id: &ComplaintId,
        assignee: &UserId,
        actor: &Actor,
    ) -> Result<Outcome<Complaint>, ApplicationError> {
        policy::ensure_staff(actor)?;
        let current = self.load(id).await?;
        if current.is_terminal() {
            return Err(DomainError::InvalidTransition {
                complaint_id: id.clone(),
                from: current.status,
                to: current.status,
            }
            .into());
        }
        let assignee = self
            .guarded("find_user", self.directory.find_user(assignee))
            .await?
            .ok_or_else(|| {
                ApplicationError::validation(format!("assignee `{assignee}` does not exist"))
            })?;

        let outcome = self
            .commit_with_retry(id, "assign", |complaint, now| {
                self.machine.assign(complaint, &assignee, actor, now)
            })
            .await?;

        info!(
            event_name = "complaint.assign.committed",
            complaint_id = %id,
            assignee = %assignee.id,
            status = outcome.value.complaint.status.as_str(),
            actor = %actor.user_id,
            "complaint assigned"
        );
        Ok(outcome.map(|committed| committed.complaint))
    }

    pub async fn add_note(
        &self,
        id: &ComplaintId,
        comment: &str,
        visibility: Visibility,
        actor: &Actor,
    ) -> Result<Outcome<TimelineEntry>, ApplicationError> {
        let outcome = self
            .commit_with_retry(id, "annotate", |complaint, now| {
                self.machine.annotate(complaint, comment, visibility, actor, now)
            })
            .await?;

        info!(
            event_name = "complaint.note.committed",
            complaint_id = %id,
            visibility = visibility.as_str(),
            actor = %actor.user_id,
            "timeline note added"
        );
        Ok(outcome.map(|committed| committed.timeline_entry))
    }

    pub async fn complaint(
        &self,
        id: &ComplaintId,
        actor: &Actor,
    ) -> Result<Complaint, ApplicationError> {
        let complaint = self.load(id).await?;
        policy::authorize_view(&complaint, actor)?;
        Ok(complaint)
    }

    /// Entries visible to `actor`, oldest first.
    pub async fn timeline(
        &self,
        id: &ComplaintId,
        actor: &Actor,
    ) -> Result<Vec<TimelineEntry>, ApplicationError> {
        let complaint = self.load(id).await?;
        policy::authorize_view(&complaint, actor)?;

        let entries = self.guarded("list_timeline", self.store.list_timeline(id)).await?;
        Ok(entries.into_iter().filter(|entry| policy::can_view_entry(entry, actor)).collect())
    }

    pub async fn notifications(&self, actor: &Actor) -> Result<Vec<Notification>, ApplicationError> {
        policy::ensure_active(actor)?;
        self.guarded("list_notifications_for", self.store.list_notifications_for(&actor.user_id))
            .await
    }

    pub async fn mark_notification_read(
        &self,
        id: NotificationId,
        actor: &Actor,
    ) -> Result<Notification, ApplicationError> {
        policy::ensure_active(actor)?;
        let notification = self
            .guarded("find_notification", self.store.find_notification(id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("notification", id.0.to_string()))?;
        if notification.recipient.as_ref() != Some(&actor.user_id) {
            return Err(ApplicationError::forbidden(
                "only the recipient may mark a notification read",
            ));
        }

        if !notification.read {
            let updated = self
                .guarded("mark_notification_read", self.store.mark_notification_read(id))
                .await?;
            if !updated {
                return Err(ApplicationError::not_found("notification", id.0.to_string()));
            }
        }
        Ok(Notification { read: true, ..notification })
    }

    pub(crate) async fn load(&self, id: &ComplaintId) -> Result<Complaint, ApplicationError> {
        self.guarded("find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or_else(|| ApplicationError::not_found("complaint", id.0.clone()))
    }

    /// Bounds a store call by the configured timeout.
    pub(crate) async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, ApplicationError> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(result) => result.map_err(|error| repository_failure(operation, error)),
            Err(_) => {
                let timeout_ms = u64::try_from(self.settings.store_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    event_name = "workflow.store.timeout",
                    operation,
                    timeout_ms,
                    "store call exceeded its deadline"
                );
                Err(ApplicationError::DependencyFailure(format!(
                    "{operation} timed out after {timeout_ms} ms"
                )))
            }
        }
    }

    async fn commit_with_retry<F>(
        &self,
        id: &ComplaintId,
        action: &'static str,
        mut plan: F,
    ) -> Result<Outcome<CommittedChange>, ApplicationError>
    where
        F: FnMut(&Complaint, DateTime<Utc>) -> Result<ComplaintChange, DomainError>,
    {
        let attempts = self.settings.max_conflict_retries.max(1);
        let mut attempt = 1;
        loop {
            let complaint = self.load(id).await?;
            let change = plan(&complaint, self.now())?;

            match self.guarded("commit_change", self.store.commit_change(change)).await {
                Ok(committed) => {
                    let warnings = self.deliver(&committed.notifications).await;
                    return Ok(Outcome { value: committed, warnings });
                }
                Err(ApplicationError::Conflict(conflicted)) if attempt < attempts => {
                    warn!(
                        event_name = "complaint.change.conflict_retry",
                        action,
                        complaint_id = %conflicted,
                        attempt,
                        "complaint changed concurrently; re-reading"
                    );
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Hands committed notifications to the dispatcher. Failures become warnings.
    pub(crate) async fn deliver(&self, notifications: &[Notification]) -> Vec<String> {
        let mut warnings = Vec::new();
        for notification in notifications.iter().filter(|notification| notification.recipient.is_some()) {
            let delivery =
                tokio::time::timeout(self.settings.store_timeout, self.dispatcher.dispatch(notification))
                    .await
                    .unwrap_or_else(|_| Err(DispatchError("dispatcher timed out".to_owned())));

            if let Err(error) = delivery {
                warn!(
                    event_name = "notification.dispatch.failed",
                    notification_id = notification.id.0,
                    complaint_id = %notification.complaint_id,
                    error = %error,
                    "notification recorded but not delivered"
                );
                warnings.push(format!(
                    "notification {} for complaint {} was recorded but not delivered: {error}",
                    notification.id.0, notification.complaint_id
                ));
            }
        }
        warnings
    }
}

fn repository_failure(operation: &'static str, error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::Conflict(id) => ApplicationError::Conflict(id),
        other => ApplicationError::DependencyFailure(format!("{operation} failed: {other}")),
    }
}
