pub mod config;
pub mod doctor;
pub mod migrate;
pub mod overdue;
pub mod seed;
pub mod sweep;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use grievance_core::config::{AppConfig, LoadOptions};
use grievance_core::errors::ApplicationError;
use grievance_db::{
    connect_with_config, migrations, DbPool, SqlComplaintStore, SqlReferenceDirectory,
};
use grievance_workflow::{FixedClock, LogDispatcher, WorkflowService};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// (error_class, message, exit_code) carried out of a command's async block.
pub(crate) type CommandFailure = (&'static str, String, u8);

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

/// Connects and applies pending migrations.
pub(crate) async fn migrated_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

/// Wires the workflow service against SQLite. `at` pins the clock for replaying a
/// sweep as of a given instant.
pub(crate) fn workflow_service(
    config: &AppConfig,
    pool: &DbPool,
    at: Option<DateTime<Utc>>,
) -> WorkflowService {
    let service = WorkflowService::from_config(
        config,
        Arc::new(SqlComplaintStore::new(pool.clone())),
        Arc::new(SqlReferenceDirectory::new(pool.clone())),
        Arc::new(LogDispatcher),
    );
    match at {
        Some(at) => service.with_clock(Arc::new(FixedClock::new(at))),
        None => service,
    }
}

pub(crate) fn workflow_failure(error: ApplicationError) -> CommandFailure {
    (error.kind().as_str(), error.to_string(), 7u8)
}

/// Parses an RFC 3339 `--at` override; absent means the wall clock.
pub(crate) fn parse_at(command: &str, at: Option<&str>) -> Result<Option<DateTime<Utc>>, CommandResult> {
    let Some(raw) = at else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|parsed| Some(parsed.with_timezone(&Utc)))
        .map_err(|error| {
            CommandResult::failure(
                command,
                "invalid_argument",
                format!("`--at` must be an RFC 3339 timestamp: {error}"),
                2,
            )
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_at, CommandResult};

    #[test]
    fn failure_payload_carries_error_class_and_no_data() {
        let result = CommandResult::failure("sweep", "dependency_failure", "store timed out", 7);
        let payload: serde_json::Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 7);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "dependency_failure");
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn success_payload_embeds_data() {
        let result =
            CommandResult::success_with_data("overdue", "2 overdue", Some(json!({ "count": 2 })));
        let payload: serde_json::Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(payload["data"]["count"], 2);
        assert_eq!(payload["error_class"], serde_json::Value::Null);
    }

    #[test]
    fn at_override_accepts_rfc3339_and_rejects_other_formats() {
        let parsed = parse_at("sweep", Some("2026-03-01T00:00:00Z")).expect("valid");
        assert_eq!(
            parsed.map(|at| at.to_rfc3339()),
            Some("2026-03-01T00:00:00+00:00".to_string())
        );
        assert!(parse_at("sweep", None).expect("absent").is_none());

        let rejected = parse_at("sweep", Some("March 1st")).err().expect("invalid");
        assert_eq!(rejected.exit_code, 2);
        assert!(rejected.output.contains("invalid_argument"));
    }
}
