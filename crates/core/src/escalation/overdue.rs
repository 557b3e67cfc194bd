use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::complaint::Complaint;
use crate::domain::rule::{EscalationRule, RuleId};
use crate::escalation::rules::RuleSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueAssessment {
    pub rule: EscalationRule,
    pub hours_open: i64,
    pub hours_overdue: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueComplaint {
    pub complaint: Complaint,
    pub rule_id: RuleId,
    pub hours_open: i64,
    pub hours_overdue: i64,
}

/// A complaint is overdue once strictly more time than its governing rule allows has
/// passed since submission. Closed and already escalated complaints never are.
pub fn assess(complaint: &Complaint, rules: &RuleSet, now: DateTime<Utc>) -> Option<OverdueAssessment> {
    if !complaint.status.is_sweep_eligible() {
        return None;
    }
    let rule = rules.select(complaint)?;
    let deadline = Duration::hours(i64::from(rule.hours_before_escalation));
    if now - complaint.created_at <= deadline {
        return None;
    }

    let hours_open = complaint.hours_open(now);
    Some(OverdueAssessment {
        rule: rule.clone(),
        hours_open,
        hours_overdue: (hours_open - i64::from(rule.hours_before_escalation)).max(0),
    })
}

/// Overdue complaints, most overdue first; ties go to the oldest submission.
pub fn rank_overdue<'a>(
    complaints: impl IntoIterator<Item = &'a Complaint>,
    rules: &RuleSet,
    now: DateTime<Utc>,
) -> Vec<OverdueComplaint> {
    let mut overdue: Vec<OverdueComplaint> = complaints
        .into_iter()
        .filter_map(|complaint| {
            assess(complaint, rules, now).map(|assessment| OverdueComplaint {
                complaint: complaint.clone(),
                rule_id: assessment.rule.id,
                hours_open: assessment.hours_open,
                hours_overdue: assessment.hours_overdue,
            })
        })
        .collect();
    overdue.sort_by(|left, right| {
        right
            .hours_overdue
            .cmp(&left.hours_overdue)
            .then_with(|| left.complaint.created_at.cmp(&right.complaint.created_at))
    });
    overdue
}
