use std::collections::HashMap;
use std::env;

use anyhow::{Context, bail};
use config::{Config, Environment, File};
use dotenvy::dotenv;
use editorial_common::database::DatabaseSettings;
use editorial_common::schedule::Channel;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_port: String,
    #[serde(default)]
    pub storage: StorageBackend,
    /// Required only with the postgres backend
    pub database: Option<DatabaseSettings>,
    pub scheduler: SchedulerSettings,
    pub dispatch: DispatchSettings,
    pub drafts: DraftSettings,
    pub review: ReviewSettings,
    /// Role name to the editorial actions it grants, `*` for all of them
    #[serde(default)]
    pub permissions: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub tick_interval_seconds: u64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    pub attempt_timeout_seconds: u64,
    pub max_attempts: u32,
    pub initial_backoff_millis: u64,
    pub default_channels: Vec<Channel>,
    #[serde(default)]
    pub channels: Vec<ChannelSettings>,
}

/// Outbound adapter for one channel. Without `webhook_url` the channel only logs.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSettings {
    pub channel: Channel,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftSettings {
    pub autosave_interval_seconds: u64,
    /// Editing sessions without an update for this long stop auto-saving
    #[serde(default = "default_session_idle_seconds")]
    pub session_idle_timeout_seconds: u64,
}

fn default_session_idle_seconds() -> u64 {
    1800
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSettings {
    /// Due period of reviewer assignments made without a due date; none when absent
    pub default_due_hours: Option<i64>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        let run_mode = load_env("RUN_MODE", "development");

        let s = Config::builder()
            .add_source(File::with_name("./config/default"))
            .add_source(File::with_name(&format!("./config/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("app").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize().with_context(|| "failed to read config")?;
        settings.dispatch.validate()?;
        Ok(settings)
    }
}

impl DispatchSettings {
    /// A publication only goes live through the site channel.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.default_channels.contains(&Channel::Site) {
            bail!("dispatch.default_channels must include the site channel");
        }
        Ok(())
    }
}

fn load_env(key: &str, default_value: &'static str) -> String {
    env::var(key).unwrap_or_else(|_| default_value.into())
}
