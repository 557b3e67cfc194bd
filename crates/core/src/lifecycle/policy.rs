//! Role and ownership rules. Every check runs before any write is attempted.

use crate::domain::complaint::{Complaint, ComplaintStatus};
use crate::domain::timeline::{TimelineEntry, Visibility};
use crate::domain::user::Actor;
use crate::errors::DomainError;

pub fn ensure_active(actor: &Actor) -> Result<(), DomainError> {
    if actor.active {
        return Ok(());
    }
    Err(DomainError::Forbidden(format!("account `{}` is deactivated", actor.user_id)))
}

pub fn ensure_staff(actor: &Actor) -> Result<(), DomainError> {
    ensure_active(actor)?;
    if actor.role.is_staff() {
        return Ok(());
    }
    Err(DomainError::Forbidden(format!(
        "role `{}` may not perform administrative complaint actions",
        actor.role
    )))
}

pub fn authorize_transition(
    complaint: &Complaint,
    actor: &Actor,
    target: ComplaintStatus,
) -> Result<(), DomainError> {
    ensure_active(actor)?;
    if actor.role.is_staff() {
        return Ok(());
    }

    if !complaint.is_owned_by(&actor.user_id) {
        return Err(DomainError::Forbidden(format!(
            "complaint {} does not belong to `{}`",
            complaint.id, actor.user_id
        )));
    }
    if target.is_staff_only() {
        return Err(DomainError::Forbidden(format!(
            "only staff may move a complaint to `{target}`"
        )));
    }
    Ok(())
}

pub fn can_view(complaint: &Complaint, actor: &Actor) -> bool {
    actor.active && (actor.role.is_staff() || complaint.is_owned_by(&actor.user_id))
}

pub fn authorize_view(complaint: &Complaint, actor: &Actor) -> Result<(), DomainError> {
    ensure_active(actor)?;
    if can_view(complaint, actor) {
        return Ok(());
    }
    Err(DomainError::Forbidden(format!(
        "complaint {} does not belong to `{}`",
        complaint.id, actor.user_id
    )))
}

/// Internal entries are staff-only.
pub fn can_view_entry(entry: &TimelineEntry, actor: &Actor) -> bool {
    entry.visibility == Visibility::Public || actor.is_staff()
}

pub fn authorize_note(
    complaint: &Complaint,
    actor: &Actor,
    visibility: Visibility,
) -> Result<(), DomainError> {
    authorize_view(complaint, actor)?;
    if visibility == Visibility::Internal && !actor.role.is_staff() {
        return Err(DomainError::Forbidden("only staff may add internal notes".to_owned()));
    }
    Ok(())
}
