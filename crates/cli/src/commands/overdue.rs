use serde::Serialize;

use crate::commands::{
    load_config, migrated_pool, parse_at, runtime, workflow_failure, workflow_service,
    CommandResult,
};

#[derive(Debug, Serialize)]
struct OverdueRow {
    complaint_id: String,
    status: &'static str,
    priority: &'static str,
    rule_id: i64,
    hours_open: i64,
    hours_overdue: i64,
}

/// Lists sweep-eligible complaints past their deadline, most overdue first.
pub fn run(at: Option<&str>) -> CommandResult {
    let at = match parse_at("overdue", at) {
        Ok(at) => at,
        Err(failure) => return failure,
    };
    let config = match load_config("overdue") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("overdue") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let service = workflow_service(&config, &pool, at);
        let overdue = service.list_overdue().await;
        pool.close().await;
        overdue.map_err(workflow_failure)
    });

    match result {
        Ok(overdue) => {
            let rows: Vec<OverdueRow> = overdue
                .into_iter()
                .map(|entry| OverdueRow {
                    complaint_id: entry.complaint.id.0,
                    status: entry.complaint.status.as_str(),
                    priority: entry.complaint.priority.as_str(),
                    rule_id: entry.rule_id.0,
                    hours_open: entry.hours_open,
                    hours_overdue: entry.hours_overdue,
                })
                .collect();
            let message = format!("{} overdue complaints", rows.len());
            CommandResult::success_with_data("overdue", message, serde_json::to_value(&rows).ok())
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("overdue", error_class, message, exit_code)
        }
    }
}
