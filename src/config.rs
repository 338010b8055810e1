use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    #[serde(default = "default_bot_config")]
    pub bot: BotConfig,
    #[serde(default = "default_schedule_config")]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SlackConfig {
    /// Web API token (`xoxb-...`)
    pub bot_token: String,
    /// Socket Mode token (`xapp-...`)
    pub app_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Invocation name users mention to trigger the bot
    #[serde(default = "default_bot_name")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

fn default_bot_name() -> String {
    "trainbot".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data").join("trainbot.db")
}

fn default_bot_config() -> BotConfig {
    BotConfig {
        name: default_bot_name(),
    }
}

fn default_schedule_config() -> ScheduleConfig {
    ScheduleConfig {
        database_path: default_db_path(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        if config.slack.bot_token.trim().is_empty() {
            anyhow::bail!("slack.bot_token must not be empty");
        }
        if config.slack.app_token.trim().is_empty() {
            anyhow::bail!("slack.app_token must not be empty");
        }
        if config.bot.name.trim().is_empty() {
            anyhow::bail!("bot.name must not be empty");
        }

        Ok(config)
    }
}
