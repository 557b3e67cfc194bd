use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::category::{Category, CategoryId};
use crate::domain::complaint::{
    AttachmentRef, Complaint, ComplaintId, ComplaintStatus, Priority, Submitter,
};
use crate::domain::timeline::{TimelineDraft, Visibility};
use crate::errors::DomainError;

pub const SUBMITTED_COMMENT: &str = "Complaint submitted";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComplaint {
    pub category_id: CategoryId,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub submitter: Submitter,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionLimits {
    pub max_subject_len: usize,
    pub max_attachments: usize,
    pub max_attachment_bytes: u64,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self { max_subject_len: 200, max_attachments: 5, max_attachment_bytes: 10 * 1024 * 1024 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedSubmission {
    pub complaint: Complaint,
    pub timeline: TimelineDraft,
}

/// Validates a submission and builds the `new` complaint plus its first timeline entry.
/// `category` is the directory lookup for `draft.category_id`.
pub fn prepare_submission(
    draft: NewComplaint,
    category: Option<&Category>,
    limits: &SubmissionLimits,
    now: DateTime<Utc>,
) -> Result<PreparedSubmission, DomainError> {
    let subject = draft.subject.trim().to_owned();
    let description = draft.description.trim().to_owned();

    if subject.is_empty() {
        return Err(DomainError::Validation("subject is required".to_owned()));
    }
    if subject.chars().count() > limits.max_subject_len {
        return Err(DomainError::Validation(format!(
            "subject exceeds {} characters",
            limits.max_subject_len
        )));
    }
    if description.is_empty() {
        return Err(DomainError::Validation("description is required".to_owned()));
    }
    match category {
        Some(category) if category.id == draft.category_id && category.active => {}
        _ => {
            return Err(DomainError::Validation(format!(
                "category {} does not exist or is inactive",
                draft.category_id
            )))
        }
    }
    if draft.attachments.len() > limits.max_attachments {
        return Err(DomainError::Validation(format!(
            "at most {} attachments are allowed",
            limits.max_attachments
        )));
    }
    if let Some(oversized) =
        draft.attachments.iter().find(|file| file.size_bytes > limits.max_attachment_bytes)
    {
        return Err(DomainError::Validation(format!(
            "attachment `{}` exceeds {} bytes",
            oversized.file_name, limits.max_attachment_bytes
        )));
    }
    if let Submitter::Anonymous { contact: Some(contact) } = &draft.submitter {
        if contact.email.as_deref().is_some_and(|email| !email.contains('@')) {
            return Err(DomainError::Validation("contact email is malformed".to_owned()));
        }
    }

    let author = draft.submitter.owner().cloned();
    let complaint = Complaint {
        row_id: 0,
        id: ComplaintId::generate(now),
        category_id: draft.category_id,
        subject,
        description,
        priority: draft.priority,
        status: ComplaintStatus::New,
        submitter: draft.submitter,
        assigned_to: None,
        escalated_to: None,
        escalation_reason: None,
        resolution_details: None,
        attachments: draft.attachments,
        version: 1,
        created_at: now,
        updated_at: now,
        resolved_at: None,
    };

    Ok(PreparedSubmission {
        complaint,
        timeline: TimelineDraft {
            status: ComplaintStatus::New,
            comment: Some(SUBMITTED_COMMENT.to_owned()),
            author,
            visibility: Visibility::Public,
            created_at: now,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{prepare_submission, NewComplaint, SubmissionLimits, SUBMITTED_COMMENT};
    use crate::domain::category::{Category, CategoryId};
    use crate::domain::complaint::{
        AnonymousContact, AttachmentRef, ComplaintStatus, Priority, Submitter,
    };
    use crate::domain::user::UserId;
    use crate::errors::DomainError;

    fn facilities() -> Category {
        Category { id: CategoryId(3), name: "Facilities".to_owned(), active: true }
    }

    fn draft(submitter: Submitter) -> NewComplaint {
        NewComplaint {
            category_id: CategoryId(3),
            subject: "  Heating broken in library  ".to_owned(),
            description: "Second floor reading room is freezing".to_owned(),
            priority: Priority::Medium,
            submitter,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn registered_submission_starts_new_with_authored_entry() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let submitter = Submitter::Registered { user_id: UserId("student-1".to_owned()) };

        let prepared = prepare_submission(
            draft(submitter),
            Some(&facilities()),
            &SubmissionLimits::default(),
            now,
        )
        .expect("valid submission");

        assert_eq!(prepared.complaint.status, ComplaintStatus::New);
        assert_eq!(prepared.complaint.subject, "Heating broken in library");
        assert_eq!(prepared.complaint.version, 1);
        assert!(prepared.complaint.resolved_at.is_none());
        assert_eq!(prepared.timeline.status, ComplaintStatus::New);
        assert_eq!(prepared.timeline.comment.as_deref(), Some(SUBMITTED_COMMENT));
        assert_eq!(prepared.timeline.author, Some(UserId("student-1".to_owned())));
    }

    #[test]
    fn anonymous_contact_does_not_author_the_entry() {
        let submitter = Submitter::Anonymous {
            contact: Some(AnonymousContact {
                name: Some("Visitor".to_owned()),
                email: Some("visitor@example.org".to_owned()),
                phone: None,
            }),
        };

        let prepared = prepare_submission(
            draft(submitter),
            Some(&facilities()),
            &SubmissionLimits::default(),
            Utc::now(),
        )
        .expect("anonymous submission");

        assert!(prepared.complaint.owner().is_none());
        assert!(prepared.timeline.author.is_none());
    }

    #[test]
    fn submission_rejects_unknown_category_and_limits() {
        let limits = SubmissionLimits { max_subject_len: 10, max_attachments: 1, max_attachment_bytes: 100 };
        let anonymous = Submitter::Anonymous { contact: None };

        let missing = prepare_submission(draft(anonymous.clone()), None, &SubmissionLimits::default(), Utc::now());
        assert!(matches!(missing, Err(DomainError::Validation(_))));

        let inactive = Category { active: false, ..facilities() };
        let closed = prepare_submission(
            draft(anonymous.clone()),
            Some(&inactive),
            &SubmissionLimits::default(),
            Utc::now(),
        );
        assert!(matches!(closed, Err(DomainError::Validation(_))));

        let long = prepare_submission(draft(anonymous.clone()), Some(&facilities()), &limits, Utc::now());
        assert!(matches!(long, Err(DomainError::Validation(message)) if message.contains("subject")));

        let mut heavy = draft(anonymous);
        heavy.subject = "Heat".to_owned();
        heavy.attachments = vec![AttachmentRef {
            file_name: "scan.pdf".to_owned(),
            content_type: "application/pdf".to_owned(),
            size_bytes: 101,
        }];
        let oversized = prepare_submission(heavy, Some(&facilities()), &limits, Utc::now());
        assert!(matches!(oversized, Err(DomainError::Validation(message)) if message.contains("scan.pdf")));
    }
}
