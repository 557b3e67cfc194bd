use chrono::{DateTime, Utc};

use crate::domain::change::ComplaintChange;
use crate::domain::complaint::{Complaint, ComplaintId, ComplaintStatus};
use crate::domain::notification::{NotificationDraft, NotificationKind};
use crate::domain::rule::EscalationRule;
use crate::domain::timeline::{TimelineDraft, Visibility};
use crate::domain::user::{Actor, Role, User};
use crate::errors::DomainError;
use crate::lifecycle::policy;

pub const AUTO_ESCALATION_REASON: &str = "Auto-escalated due to timeout";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRequest {
    pub target: ComplaintStatus,
    pub comment: Option<String>,
    pub visibility: Visibility,
}

impl TransitionRequest {
    pub fn new(target: ComplaintStatus) -> Self {
        Self { target, comment: None, visibility: Visibility::Public }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Pure lifecycle rules. Each method validates against the complaint as read and
/// returns the [`ComplaintChange`] a store must apply atomically.
#[derive(Clone, Debug, Default)]
pub struct LifecycleMachine;

impl LifecycleMachine {
    pub fn new() -> Self {
        Self
    }

    pub fn check_transition(
        &self,
        complaint_id: &ComplaintId,
        from: ComplaintStatus,
        to: ComplaintStatus,
    ) -> Result<(), DomainError> {
        if from.is_terminal() || to == ComplaintStatus::New {
            return Err(DomainError::InvalidTransition {
                complaint_id: complaint_id.clone(),
                from,
                to,
            });
        }
        Ok(())
    }

    pub fn transition(
        &self,
        complaint: &Complaint,
        request: &TransitionRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ComplaintChange, DomainError> {
        policy::authorize_transition(complaint, actor, request.target)?;
        self.check_transition(&complaint.id, complaint.status, request.target)?;
        if request.target == ComplaintStatus::Escalated {
            return Err(DomainError::Validation(
                "escalation requires a target; use the escalate operation".to_owned(),
            ));
        }

        let comment = non_empty(request.comment.as_deref());
        let mut next = advance(complaint, request.target, now);
        if request.target == ComplaintStatus::Resolved {
            next.resolution_details = comment.clone();
        }

        let mut notifications = Vec::new();
        if let Some(owner) = complaint.owner().filter(|owner| **owner != actor.user_id) {
            notifications.push(NotificationDraft {
                recipient: Some(owner.clone()),
                kind: NotificationKind::StatusUpdate,
                message: format!(
                    "Your complaint {} is now {}.",
                    complaint.id,
                    request.target.label()
                ),
                created_at: now,
            });
        }

        Ok(ComplaintChange {
            timeline: TimelineDraft {
                status: request.target,
                comment: Some(comment.unwrap_or_else(|| default_status_comment(request.target))),
                author: Some(actor.user_id.clone()),
                visibility: request.visibility,
                created_at: now,
            },
            notifications,
            expected_version: complaint.version,
            expected_status: complaint.status,
            complaint: next,
        })
    }

    pub fn escalate(
        &self,
        complaint: &Complaint,
        target: &User,
        reason: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ComplaintChange, DomainError> {
        policy::ensure_staff(actor)?;
        self.check_transition(&complaint.id, complaint.status, ComplaintStatus::Escalated)?;
        let reason = non_empty(Some(reason))
            .ok_or_else(|| DomainError::Validation("escalation reason is required".to_owned()))?;
        if target.role != Role::SuperAdmin || !target.active {
            return Err(DomainError::Validation(format!(
                "escalation target `{}` must be an active super_admin",
                target.id
            )));
        }

        let mut next = advance(complaint, ComplaintStatus::Escalated, now);
        next.escalated_to = Some(target.id.clone());
        next.escalation_reason = Some(reason.clone());

        let notifications = complaint
            .owner()
            .map(|owner| NotificationDraft {
                recipient: Some(owner.clone()),
                kind: NotificationKind::Escalation,
                message: format!("Your complaint {} has been escalated for senior review.", complaint.id),
                created_at: now,
            })
            .into_iter()
            .collect();

        Ok(ComplaintChange {
            timeline: TimelineDraft {
                status: ComplaintStatus::Escalated,
                comment: Some(format!("Escalated to {}: {reason}", target.name)),
                author: Some(actor.user_id.clone()),
                visibility: Visibility::Public,
                created_at: now,
            },
            notifications,
            expected_version: complaint.version,
            expected_status: complaint.status,
            complaint: next,
        })
    }

    /// System escalation on behalf of a sweep; the timeline entry carries no author.
    pub fn auto_escalate(
        &self,
        complaint: &Complaint,
        rule: &EscalationRule,
        target: &User,
        now: DateTime<Utc>,
    ) -> Result<ComplaintChange, DomainError> {
        if !complaint.status.is_sweep_eligible() {
            return Err(DomainError::InvalidTransition {
                complaint_id: complaint.id.clone(),
                from: complaint.status,
                to: ComplaintStatus::Escalated,
            });
        }
        if target.role != rule.escalate_to_role.as_role() || !target.active {
            return Err(DomainError::Validation(format!(
                "escalation target `{}` must be an active {}",
                target.id,
                rule.escalate_to_role.as_str()
            )));
        }

        let mut next = advance(complaint, ComplaintStatus::Escalated, now);
        next.escalated_to = Some(target.id.clone());
        next.escalation_reason = Some(AUTO_ESCALATION_REASON.to_owned());

        Ok(ComplaintChange {
            timeline: TimelineDraft {
                status: ComplaintStatus::Escalated,
                comment: Some(format!(
                    "Auto-escalated to {} after {} hours without resolution",
                    target.name, rule.hours_before_escalation
                )),
                author: None,
                visibility: Visibility::Public,
                created_at: now,
            },
            notifications: vec![NotificationDraft {
                recipient: Some(target.id.clone()),
                kind: NotificationKind::Escalation,
                message: format!(
                    "Complaint {} was escalated to you after {} hours without resolution.",
                    complaint.id, rule.hours_before_escalation
                ),
                created_at: now,
            }],
            expected_version: complaint.version,
            expected_status: complaint.status,
            complaint: next,
        })
    }

    /// Assigning a `new` complaint also moves it to `under_review`.
    pub fn assign(
        &self,
        complaint: &Complaint,
        assignee: &User,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ComplaintChange, DomainError> {
        policy::ensure_staff(actor)?;
        let status = match complaint.status {
            ComplaintStatus::New => ComplaintStatus::UnderReview,
            current => current,
        };
        if complaint.is_terminal() {
            return Err(DomainError::InvalidTransition {
                complaint_id: complaint.id.clone(),
                from: complaint.status,
                to: status,
            });
        }
        if !assignee.role.is_staff() || !assignee.active {
            return Err(DomainError::Validation(format!(
                "assignee `{}` must be an active admin or super_admin",
                assignee.id
            )));
        }

        let mut next = advance(complaint, status, now);
        next.assigned_to = Some(assignee.id.clone());
        if status == ComplaintStatus::Escalated {
            next.escalated_to = complaint.escalated_to.clone();
            next.escalation_reason = complaint.escalation_reason.clone();
        }

        let mut notifications = Vec::new();
        if assignee.id != actor.user_id {
            notifications.push(NotificationDraft {
                recipient: Some(assignee.id.clone()),
                kind: NotificationKind::Assignment,
                message: format!("Complaint {} has been assigned to you.", complaint.id),
                created_at: now,
            });
        }
        if status != complaint.status {
            if let Some(owner) = complaint.owner() {
                notifications.push(NotificationDraft {
                    recipient: Some(owner.clone()),
                    kind: NotificationKind::StatusUpdate,
                    message: format!("Your complaint {} is now {}.", complaint.id, status.label()),
                    created_at: now,
                });
            }
        }

        Ok(ComplaintChange {
            timeline: TimelineDraft {
                status,
                comment: Some(format!("Assigned to {}", assignee.name)),
                author: Some(actor.user_id.clone()),
                visibility: Visibility::Internal,
                created_at: now,
            },
            notifications,
            expected_version: complaint.version,
            expected_status: complaint.status,
            complaint: next,
        })
    }

    /// A note recorded against the current status. Allowed on closed complaints.
    pub fn annotate(
        &self,
        complaint: &Complaint,
        comment: &str,
        visibility: Visibility,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<ComplaintChange, DomainError> {
        policy::authorize_note(complaint, actor, visibility)?;
        let comment = non_empty(Some(comment))
            .ok_or_else(|| DomainError::Validation("note text is required".to_owned()))?;

        let mut next = complaint.clone();
        next.version += 1;
        next.updated_at = now;

        Ok(ComplaintChange {
            timeline: TimelineDraft {
                status: complaint.status,
                comment: Some(comment),
                author: Some(actor.user_id.clone()),
                visibility,
                created_at: now,
            },
            notifications: Vec::new(),
            expected_version: complaint.version,
            expected_status: complaint.status,
            complaint: next,
        })
    }
}

pub fn default_status_comment(status: ComplaintStatus) -> String {
    format!("Status updated to {}", status.label())
}

fn advance(complaint: &Complaint, status: ComplaintStatus, now: DateTime<Utc>) -> Complaint {
    let mut next = complaint.clone();
    next.status = status;
    next.version += 1;
    next.updated_at = now;
    if status == ComplaintStatus::Resolved {
        next.resolved_at = Some(now);
    }
    if status != ComplaintStatus::Escalated {
        next.escalated_to = None;
        next.escalation_reason = None;
    }
    next
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}
