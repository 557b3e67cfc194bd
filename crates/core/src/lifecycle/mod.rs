pub mod machine;
pub mod policy;
pub mod submission;

pub use machine::{LifecycleMachine, TransitionRequest, AUTO_ESCALATION_REASON};
pub use submission::{prepare_submission, NewComplaint, PreparedSubmission, SubmissionLimits};
