use std::sync::Arc;
use std::time::Duration;

use grievance_core::config::{AppConfig, ConfigError, LoadOptions};
use grievance_db::{
    connect_with_config, migrations, DbPool, SqlComplaintStore, SqlReferenceDirectory,
    SqlSessionRepository,
};
use grievance_workflow::{LogDispatcher, SweepCancellation, SystemClock, WorkflowService};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;
use crate::identity::{IdentityResolver, SessionIdentityResolver};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<WorkflowService>,
    pub identity: Arc<dyn IdentityResolver>,
    pub cancellation: SweepCancellation,
}

impl Application {
    pub fn api_state(&self) -> ApiState {
        ApiState {
            service: self.service.clone(),
            identity: self.identity.clone(),
            cancellation: self.cancellation.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let service = WorkflowService::from_config(
        &config,
        Arc::new(SqlComplaintStore::new(db_pool.clone())),
        Arc::new(SqlReferenceDirectory::new(db_pool.clone())),
        Arc::new(LogDispatcher),
    );
    let identity = SessionIdentityResolver::new(
        Arc::new(SqlSessionRepository::new(db_pool.clone())),
        Arc::new(SystemClock),
        Duration::from_millis(config.workflow.store_timeout_ms),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        target_selection = ?config.workflow.target_selection,
        sweep_interval_secs = config.workflow.sweep_interval_secs,
        "workflow service wired"
    );

    Ok(Application {
        config,
        db_pool,
        service: Arc::new(service),
        identity: Arc::new(identity),
        cancellation: SweepCancellation::new(),
    })
}
