pub mod cancellation;
pub mod clock;
pub mod dispatch;
pub mod service;
pub mod sweep;

pub use cancellation::SweepCancellation;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{DispatchError, LogDispatcher, NotificationDispatcher, RecordingDispatcher};
pub use service::{Outcome, SubmittedComplaint, WorkflowService, WorkflowSettings};
pub use sweep::SweepSummary;
