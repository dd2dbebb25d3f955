mod bootstrap;
mod health;
mod sweeper;

use std::time::Duration;

use anyhow::Result;
use faqbot_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use faqbot_core::config::LogFormat::*;
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
    // Logging needs the loaded config, so config errors surface on stderr only.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.pending.clone(),
    )
    .await?;
    let sweeper = sweeper::spawn(
        app.pending.clone(),
        Duration::from_secs(app.config.dispatch.pending_ttl_secs),
        Duration::from_secs(app.config.dispatch.sweep_interval_secs),
    );
    tokio::spawn(bootstrap::load_article_index(app.knowledge.clone()));

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        moderation_conversation_id = %app.config.chat.moderation_conversation_id,
        "faqbot-server started"
    );
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let runner = app.runner;
    let runner_task = tokio::spawn(async move { runner.start().await });

    wait_for_shutdown().await?;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "faqbot-server stopping"
    );
    sweeper.abort();

    match tokio::time::timeout(grace, runner_task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(error)) => warn!(error = %error, "event runner task failed"),
        Err(_) => warn!(grace_secs = grace.as_secs(), "event runner still busy after grace period"),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
