mod api;
mod bootstrap;
mod error;
mod health;
mod identity;
mod scheduler;

use std::time::Duration;

use anyhow::Result;
use grievance_core::config::{AppConfig, LoadOptions};
use tokio::sync::watch;

fn init_logging(config: &AppConfig) {
    use grievance_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap so its events are captured.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = match app.config.workflow.sweep_interval_secs {
        0 => {
            tracing::info!(
                event_name = "system.scheduler.disabled",
                correlation_id = "bootstrap",
                "periodic auto-escalation disabled by configuration"
            );
            None
        }
        secs => Some(scheduler::spawn(
            app.service.clone(),
            Duration::from_secs(secs),
            app.cancellation.clone(),
            shutdown_rx.clone(),
        )),
    };

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "grievance-server listening"
    );

    let router = api::router(app.api_state(), app.db_pool.clone());
    let mut server_shutdown = shutdown_rx;
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_shutdown.wait_for(|stopping| *stopping).await;
    });
    let server = tokio::spawn(async move { server.await });

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "grievance-server stopping"
    );
    app.cancellation.cancel();
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let drained = tokio::time::timeout(grace, async {
        if let Some(scheduler) = scheduler {
            let _ = scheduler.await;
        }
        server.await
    })
    .await;
    match drained {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => {
            tracing::error!(
                event_name = "system.server.error",
                correlation_id = "shutdown",
                error = %error,
                "server terminated with an error"
            );
        }
        Ok(Err(error)) => {
            tracing::error!(
                event_name = "system.server.error",
                correlation_id = "shutdown",
                error = %error,
                "server task panicked"
            );
        }
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight work did not drain before the grace period elapsed"
            );
        }
    }

    app.db_pool.close().await;
    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "grievance-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
