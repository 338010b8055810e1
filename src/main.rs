mod bot;
mod clock;
mod command;
mod config;
mod filter;
mod platform;
mod schedule;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::TrainBot;
use crate::config::Config;
use crate::platform::slack::SlackPlatform;
use crate::platform::ChatPlatform;
use crate::schedule::ScheduleStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trainbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bot name: {}", config.bot.name);
    info!("  Schedule: {}", config.schedule.database_path.display());

    // Without a schedule no request can succeed, so this is fatal
    let store = ScheduleStore::open(&config.schedule.database_path)?;

    let slack = SlackPlatform::connect(&config.slack)
        .await
        .context("Failed to connect to Slack")?;
    let platform: Arc<dyn ChatPlatform> = Arc::new(slack);

    let bot = TrainBot::new(&config.bot.name, Arc::clone(&platform), store);
    bot.first_run_check(&chrono::Utc::now().to_rfc3339()).await;

    let events = platform.subscribe().await?;
    info!("Bot is running as {}", platform.self_identity());

    tokio::select! {
        _ = bot.run(events) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutting down");
        }
    }

    Ok(())
}
