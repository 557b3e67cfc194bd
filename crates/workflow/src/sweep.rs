use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use grievance_core::domain::complaint::{Complaint, ComplaintId};
use grievance_core::domain::rule::RuleId;
use grievance_core::domain::user::UserId;
use grievance_core::errors::ApplicationError;
use grievance_core::escalation::{assess, rank_overdue, OverdueComplaint, RuleSet};

use crate::cancellation::SweepCancellation;
use crate::service::WorkflowService;

/// Result of one auto-escalation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub scanned: usize,
    pub escalated_count: usize,
    pub skipped_count: usize,
    pub cancelled: bool,
    pub escalated: Vec<ComplaintId>,
    pub warnings: Vec<String>,
}

enum SweepStep {
    NotDue,
    Escalated { target: UserId, warnings: Vec<String> },
    NoTarget { rule_id: RuleId },
}

impl WorkflowService {
    /// Escalates every overdue complaint that has an eligible target. Each complaint is
    /// handled on its own: a failure is logged, counted as skipped, and the pass moves on.
    pub async fn auto_escalate(
        &self,
        cancellation: &SweepCancellation,
    ) -> Result<SweepSummary, ApplicationError> {
        let now = self.now();
        let rules = self.rule_set().await?;
        let candidates =
            self.guarded("list_sweep_candidates", self.store.list_sweep_candidates()).await?;

        info!(
            event_name = "escalation.sweep.started",
            candidates = candidates.len(),
            rules = rules.rules().len(),
            at = %now.to_rfc3339(),
            "auto-escalation sweep started"
        );

        let mut summary = SweepSummary::default();
        for complaint in candidates {
            if cancellation.is_cancelled() {
                summary.cancelled = true;
                info!(
                    event_name = "escalation.sweep.cancelled",
                    scanned = summary.scanned,
                    "auto-escalation sweep stopped before finishing"
                );
                break;
            }
            summary.scanned += 1;

            let complaint_id = complaint.id.clone();
            match self.sweep_one(complaint, &rules, now).await {
                Ok(SweepStep::NotDue) => {}
                Ok(SweepStep::Escalated { target, warnings }) => {
                    info!(
                        event_name = "escalation.sweep.escalated",
                        complaint_id = %complaint_id,
                        escalated_to = %target,
                        "overdue complaint auto-escalated"
                    );
                    summary.escalated_count += 1;
                    summary.escalated.push(complaint_id);
                    summary.warnings.extend(warnings);
                }
                Ok(SweepStep::NoTarget { rule_id }) => {
                    warn!(
                        event_name = "escalation.sweep.no_target",
                        complaint_id = %complaint_id,
                        rule_id = rule_id.0,
                        "overdue complaint has no active escalation target"
                    );
                    summary.skipped_count += 1;
                }
                Err(error) => {
                    warn!(
                        event_name = "escalation.sweep.item_failed",
                        complaint_id = %complaint_id,
                        error_kind = error.kind().as_str(),
                        error = %error,
                        "complaint skipped during auto-escalation"
                    );
                    summary.skipped_count += 1;
                }
            }
        }

        info!(
            event_name = "escalation.sweep.completed",
            scanned = summary.scanned,
            escalated_count = summary.escalated_count,
            skipped_count = summary.skipped_count,
            cancelled = summary.cancelled,
            "auto-escalation sweep finished"
        );
        Ok(summary)
    }

    /// Overdue open complaints, most overdue first.
    pub async fn list_overdue(&self) -> Result<Vec<OverdueComplaint>, ApplicationError> {
        let now = self.now();
        let rules = self.rule_set().await?;
        let candidates =
            self.guarded("list_sweep_candidates", self.store.list_sweep_candidates()).await?;
        Ok(rank_overdue(&candidates, &rules, now))
    }

    async fn rule_set(&self) -> Result<RuleSet, ApplicationError> {
        let rules =
            self.guarded("list_escalation_rules", self.directory.list_escalation_rules()).await?;
        RuleSet::new(rules).map_err(|error| ApplicationError::Configuration(error.to_string()))
    }

    async fn sweep_one(
        &self,
        complaint: Complaint,
        rules: &RuleSet,
        now: DateTime<Utc>,
    ) -> Result<SweepStep, ApplicationError> {
        let attempts = self.settings.max_conflict_retries.max(1);
        let mut current = complaint;
        let mut attempt = 1;
        loop {
            let Some(assessment) = assess(&current, rules, now) else {
                return Ok(SweepStep::NotDue);
            };

            let role = assessment.rule.escalate_to_role.as_role();
            let candidates = self
                .guarded("list_active_users_by_role", self.directory.list_active_users_by_role(role))
                .await?;
            let Some(target) = self.selector.select(&assessment.rule, &candidates) else {
                return Ok(SweepStep::NoTarget { rule_id: assessment.rule.id });
            };

            let change = self.machine.auto_escalate(&current, &assessment.rule, target, now)?;
            match self.guarded("commit_change", self.store.commit_change(change)).await {
                Ok(committed) => {
                    let warnings = self.deliver(&committed.notifications).await;
                    return Ok(SweepStep::Escalated { target: target.id.clone(), warnings });
                }
                Err(ApplicationError::Conflict(conflicted)) if attempt < attempts => {
                    warn!(
                        event_name = "escalation.sweep.conflict_retry",
                        complaint_id = %conflicted,
                        attempt,
                        "complaint changed during the sweep; re-reading"
                    );
                    attempt += 1;
                    current = self.load(&current.id).await?;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
