use grievance_workflow::SweepCancellation;

use crate::commands::{
    load_config, migrated_pool, parse_at, runtime, workflow_failure, workflow_service,
    CommandResult,
};

/// Runs one auto-escalation pass and reports its summary.
pub fn run(at: Option<&str>) -> CommandResult {
    let at = match parse_at("sweep", at) {
        Ok(at) => at,
        Err(failure) => return failure,
    };
    let config = match load_config("sweep") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("sweep") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let service = workflow_service(&config, &pool, at);
        let summary = service.auto_escalate(&SweepCancellation::new()).await;
        pool.close().await;
        summary.map_err(workflow_failure)
    });

    match result {
        Ok(summary) => {
            let message = format!(
                "sweep scanned {} complaints: {} escalated, {} skipped",
                summary.scanned, summary.escalated_count, summary.skipped_count
            );
            CommandResult::success_with_data("sweep", message, serde_json::to_value(&summary).ok())
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}
