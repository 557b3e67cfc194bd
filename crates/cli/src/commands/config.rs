use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use grievance_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_key) in effective_values(&config) {
        let source =
            field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String, Option<&'static str>)> {
    let workflow = &config.workflow;
    let submission = &config.submission;
    vec![
        ("database.url", config.database.url.clone(), Some("GRIEVANCE_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("GRIEVANCE_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("GRIEVANCE_DATABASE_TIMEOUT_SECS"),
        ),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            Some("GRIEVANCE_SERVER_BIND_ADDRESS"),
        ),
        ("server.port", config.server.port.to_string(), Some("GRIEVANCE_SERVER_PORT")),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            Some("GRIEVANCE_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        (
            "workflow.store_timeout_ms",
            workflow.store_timeout_ms.to_string(),
            Some("GRIEVANCE_WORKFLOW_STORE_TIMEOUT_MS"),
        ),
        (
            "workflow.max_conflict_retries",
            workflow.max_conflict_retries.to_string(),
            Some("GRIEVANCE_WORKFLOW_MAX_CONFLICT_RETRIES"),
        ),
        (
            "workflow.sweep_interval_secs",
            match workflow.sweep_interval_secs {
                0 => "0 (scheduler disabled)".to_string(),
                secs => secs.to_string(),
            },
            Some("GRIEVANCE_WORKFLOW_SWEEP_INTERVAL_SECS"),
        ),
        (
            "workflow.target_selection",
            format!("{:?}", workflow.target_selection),
            Some("GRIEVANCE_WORKFLOW_TARGET_SELECTION"),
        ),
        (
            "workflow.selection_seed",
            workflow.selection_seed.map(|seed| seed.to_string()).unwrap_or_else(|| "<unset>".to_string()),
            Some("GRIEVANCE_WORKFLOW_SELECTION_SEED"),
        ),
        (
            "submission.max_subject_len",
            submission.max_subject_len.to_string(),
            Some("GRIEVANCE_SUBMISSION_MAX_SUBJECT_LEN"),
        ),
        (
            "submission.max_attachments",
            submission.max_attachments.to_string(),
            Some("GRIEVANCE_SUBMISSION_MAX_ATTACHMENTS"),
        ),
        (
            "submission.max_attachment_bytes",
            submission.max_attachment_bytes.to_string(),
            Some("GRIEVANCE_SUBMISSION_MAX_ATTACHMENT_BYTES"),
        ),
        ("logging.level", config.logging.level.clone(), Some("GRIEVANCE_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            Some("GRIEVANCE_LOGGING_FORMAT"),
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("grievance.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/grievance.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
