use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use grievance_workflow::{SweepCancellation, WorkflowService};

/// Runs `auto_escalate` every `interval` until `shutdown` flips to `true`.
///
/// The first tick fires one full interval after start. A sweep already in flight
/// observes `cancellation` between complaints.
pub fn spawn(
    service: Arc<WorkflowService>,
    interval: Duration,
    cancellation: SweepCancellation,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            event_name = "system.scheduler.start",
            correlation_id = "scheduler",
            interval_secs = interval.as_secs(),
            "auto-escalation scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if cancellation.is_cancelled() {
                        break;
                    }
                    match service.auto_escalate(&cancellation).await {
                        Ok(summary) => info!(
                            event_name = "system.scheduler.sweep_finished",
                            correlation_id = "scheduler",
                            scanned = summary.scanned,
                            escalated_count = summary.escalated_count,
                            skipped_count = summary.skipped_count,
                            cancelled = summary.cancelled,
                            "scheduled sweep finished"
                        ),
                        Err(error) => error!(
                            event_name = "system.scheduler.sweep_failed",
                            correlation_id = "scheduler",
                            error = %error,
                            "scheduled sweep failed"
                        ),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            event_name = "system.scheduler.stop",
            correlation_id = "scheduler",
            "auto-escalation scheduler stopped"
        );
    })
}
