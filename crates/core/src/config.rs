use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::submission::SubmissionLimits;

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub workflow: WorkflowConfig,
    pub submission: SubmissionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct WorkflowConfig {
    pub store_timeout_ms: u64,
    pub max_conflict_retries: u32,
    /// `0` disables the periodic auto-escalation sweep.
    pub sweep_interval_secs: u64,
    pub target_selection: TargetSelection,
    /// Only read by the `random` strategy.
    pub selection_seed: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubmissionConfig {
    pub max_subject_len: usize,
    pub max_attachments: usize,
    pub max_attachment_bytes: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelection {
    RoundRobin,
    First,
    Random,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub sweep_interval_secs: Option<u64>,
    pub target_selection: Option<TargetSelection>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://grievance.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            workflow: WorkflowConfig {
                store_timeout_ms: 5_000,
                max_conflict_retries: 3,
                sweep_interval_secs: 900,
                target_selection: TargetSelection::RoundRobin,
                selection_seed: None,
            },
            submission: SubmissionConfig {
                max_subject_len: 200,
                max_attachments: 5,
                max_attachment_bytes: 10 * 1024 * 1024,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl SubmissionConfig {
    pub fn limits(&self) -> SubmissionLimits {
        SubmissionLimits {
            max_subject_len: self.max_subject_len,
            max_attachments: self.max_attachments,
            max_attachment_bytes: self.max_attachment_bytes,
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for TargetSelection {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "round_robin" => Ok(Self::RoundRobin),
            "first" => Ok(Self::First),
            "random" => Ok(Self::Random),
            other => Err(ConfigError::Validation(format!(
                "unsupported target selection `{other}` (expected round_robin|first|random)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("grievance.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(workflow) = patch.workflow {
            if let Some(store_timeout_ms) = workflow.store_timeout_ms {
                self.workflow.store_timeout_ms = store_timeout_ms;
            }
            if let Some(max_conflict_retries) = workflow.max_conflict_retries {
                self.workflow.max_conflict_retries = max_conflict_retries;
            }
            if let Some(sweep_interval_secs) = workflow.sweep_interval_secs {
                self.workflow.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(target_selection) = workflow.target_selection {
                self.workflow.target_selection = target_selection;
            }
            if let Some(selection_seed) = workflow.selection_seed {
                self.workflow.selection_seed = Some(selection_seed);
            }
        }

        if let Some(submission) = patch.submission {
            if let Some(max_subject_len) = submission.max_subject_len {
                self.submission.max_subject_len = max_subject_len;
            }
            if let Some(max_attachments) = submission.max_attachments {
                self.submission.max_attachments = max_attachments;
            }
            if let Some(max_attachment_bytes) = submission.max_attachment_bytes {
                self.submission.max_attachment_bytes = max_attachment_bytes;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("GRIEVANCE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("GRIEVANCE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("GRIEVANCE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("GRIEVANCE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("GRIEVANCE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("GRIEVANCE_SERVER_PORT") {
            self.server.port = parse_u16("GRIEVANCE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("GRIEVANCE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("GRIEVANCE_WORKFLOW_STORE_TIMEOUT_MS") {
            self.workflow.store_timeout_ms =
                parse_u64("GRIEVANCE_WORKFLOW_STORE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_WORKFLOW_MAX_CONFLICT_RETRIES") {
            self.workflow.max_conflict_retries =
                parse_u32("GRIEVANCE_WORKFLOW_MAX_CONFLICT_RETRIES", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_WORKFLOW_SWEEP_INTERVAL_SECS") {
            self.workflow.sweep_interval_secs =
                parse_u64("GRIEVANCE_WORKFLOW_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_WORKFLOW_TARGET_SELECTION") {
            self.workflow.target_selection = value.parse()?;
        }
        if let Some(value) = read_env("GRIEVANCE_WORKFLOW_SELECTION_SEED") {
            self.workflow.selection_seed =
                Some(parse_u64("GRIEVANCE_WORKFLOW_SELECTION_SEED", &value)?);
        }

        if let Some(value) = read_env("GRIEVANCE_SUBMISSION_MAX_SUBJECT_LEN") {
            self.submission.max_subject_len =
                parse_usize("GRIEVANCE_SUBMISSION_MAX_SUBJECT_LEN", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_SUBMISSION_MAX_ATTACHMENTS") {
            self.submission.max_attachments =
                parse_usize("GRIEVANCE_SUBMISSION_MAX_ATTACHMENTS", &value)?;
        }
        if let Some(value) = read_env("GRIEVANCE_SUBMISSION_MAX_ATTACHMENT_BYTES") {
            self.submission.max_attachment_bytes =
                parse_u64("GRIEVANCE_SUBMISSION_MAX_ATTACHMENT_BYTES", &value)?;
        }

        let log_level =
            read_env("GRIEVANCE_LOGGING_LEVEL").or_else(|| read_env("GRIEVANCE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("GRIEVANCE_LOGGING_FORMAT").or_else(|| read_env("GRIEVANCE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(sweep_interval_secs) = overrides.sweep_interval_secs {
            self.workflow.sweep_interval_secs = sweep_interval_secs;
        }
        if let Some(target_selection) = overrides.target_selection {
            self.workflow.target_selection = target_selection;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_workflow(&self.workflow)?;
        validate_submission(&self.submission)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("grievance.toml"), PathBuf::from("config/grievance.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_workflow(workflow: &WorkflowConfig) -> Result<(), ConfigError> {
    if workflow.store_timeout_ms == 0 || workflow.store_timeout_ms > 60_000 {
        return Err(ConfigError::Validation(
            "workflow.store_timeout_ms must be in range 1..=60000".to_string(),
        ));
    }

    if workflow.max_conflict_retries == 0 || workflow.max_conflict_retries > 10 {
        return Err(ConfigError::Validation(
            "workflow.max_conflict_retries must be in range 1..=10".to_string(),
        ));
    }

    if workflow.sweep_interval_secs != 0 && workflow.sweep_interval_secs < 10 {
        return Err(ConfigError::Validation(
            "workflow.sweep_interval_secs must be 0 (disabled) or at least 10".to_string(),
        ));
    }

    Ok(())
}

fn validate_submission(submission: &SubmissionConfig) -> Result<(), ConfigError> {
    if submission.max_subject_len == 0 {
        return Err(ConfigError::Validation(
            "submission.max_subject_len must be greater than zero".to_string(),
        ));
    }

    if submission.max_attachments > 0 && submission.max_attachment_bytes == 0 {
        return Err(ConfigError::Validation(
            "submission.max_attachment_bytes must be greater than zero when attachments are allowed"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    workflow: Option<WorkflowPatch>,
    submission: Option<SubmissionPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkflowPatch {
    store_timeout_ms: Option<u64>,
    max_conflict_retries: Option<u32>,
    sweep_interval_secs: Option<u64>,
    target_selection: Option<TargetSelection>,
    selection_seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SubmissionPatch {
    max_subject_len: Option<usize>,
    max_attachments: Option<usize>,
    max_attachment_bytes: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
