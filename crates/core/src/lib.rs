pub mod config;
pub mod domain;
pub mod errors;
pub mod escalation;
pub mod lifecycle;

pub use domain::category::{Category, CategoryId};
pub use domain::change::ComplaintChange;
pub use domain::complaint::{
    AnonymousContact, AttachmentRef, Complaint, ComplaintId, ComplaintStatus, Priority, Submitter,
};
pub use domain::notification::{Notification, NotificationDraft, NotificationId, NotificationKind};
pub use domain::rule::{EscalationRole, EscalationRule, RuleId};
pub use domain::timeline::{TimelineDraft, TimelineEntry, TimelineEntryId, Visibility};
pub use domain::user::{Actor, Role, User, UserId};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use escalation::{OverdueAssessment, OverdueComplaint, RuleSet, TargetSelector};
pub use lifecycle::{LifecycleMachine, NewComplaint, SubmissionLimits, TransitionRequest};
