mod bootstrap;
mod health;

use std::time::Duration;

use anyhow::Result;
use taskbot_core::config::{AppConfig, LoadOptions};
use taskbot_slack::TaskBotService;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn init_logging(config: &AppConfig) {
    use taskbot_core::config::LogFormat::*;
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
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.service.clone(),
    )
    .await?;

    app.slack_runner.start().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "taskbot-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        pending_completions = app.service.pending_completions(),
        "taskbot-server stopping"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(grace, drain_completions(&app.service)).await.is_err() {
        tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            pending_completions = app.service.pending_completions(),
            "completion changes still pending at shutdown"
        );
    }

    Ok(())
}

/// Waits for debounced completion commits so a toggle made just before
/// shutdown still reaches the task store.
async fn drain_completions(service: &TaskBotService) {
    while service.pending_completions() > 0 {
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
