pub mod overdue;
pub mod rules;
pub mod selection;

pub use overdue::{assess, rank_overdue, OverdueAssessment, OverdueComplaint};
pub use rules::RuleSet;
pub use selection::{
    selector_for, FirstCandidateSelector, RandomSelector, RoundRobinSelector, TargetSelector,
};
