mod bootstrap;
mod health;

use anyhow::Result;

use saiborg_core::config::{AppConfig, LoadOptions};
use saiborg_slack::socket::SocketModeRunner;

fn init_logging(config: &AppConfig) {
    use saiborg_core::config::LogFormat::*;
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
    dotenvy::dotenv().ok();

    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.store.clone(),
        app.config.crm.enabled(),
    )
    .await?;

    // The bot user id drives mention stripping and loop prevention, so a
    // failing identity lookup is fatal at startup.
    let identity = app.slack_api.auth_test().await?;
    tracing::info!(
        event_name = "system.server.identity_resolved",
        correlation_id = "bootstrap",
        bot_user_id = %identity.user_id,
        "resolved bot identity"
    );

    let dispatcher = bootstrap::build_dispatcher(&app, &identity.user_id);
    let runner = SocketModeRunner::with_dispatcher(dispatcher);

    tracing::info!(
        event_name = "system.server.slack_transport_mode",
        transport_mode = if runner.is_noop_transport() { "noop" } else { "socket" },
        correlation_id = "bootstrap",
        "slack runner transport mode initialized"
    );

    runner.start().await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "saiborg-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "saiborg-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
