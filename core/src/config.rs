//! Configuration loading and management.
//! Uses injected `AppPaths` so platform shells control where files live.

use std::fs;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::invoker::CliInvoker;
use crate::platform::AppPaths;
use crate::poller::PollerSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Wait before the first status check after startup.
    pub initial_delay_secs: u64,
    /// Period of the regular status check.
    pub interval_secs: u64,
    /// Pause after an on-demand recheck before the regular cadence resumes.
    pub settle_delay_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 2,
            interval_secs: 30,
            settle_delay_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Pause after a failed auto-connect before picking a location ourselves.
    pub retry_delay_ms: u64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the VPN client. `ADGUARD_CMD` takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cli_path: Option<String>,
    /// Directories prepended to PATH for every client invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub poller: PollerConfig,
    pub connect: ConnectConfig,
}

impl Config {
    /// Load configuration from the provided paths. Creates a default file if missing.
    pub fn load_with(paths: &dyn AppPaths) -> Result<Self, ConfigError> {
        let config_path = paths.config_path();

        if !config_path.exists() {
            info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let default_config = Self::default();
            default_config.save_with(paths)?;
            return Ok(default_config);
        }

        debug!("Loading config from {:?}", config_path);
        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;

        info!(
            "Loaded config (poll every {}s)",
            config.poller.interval_secs
        );
        Ok(config)
    }

    /// Save configuration to the provided paths.
    pub fn save_with(&self, paths: &dyn AppPaths) -> Result<(), ConfigError> {
        let config_path = paths.config_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            initial_delay: Duration::from_secs(self.poller.initial_delay_secs),
            // A zero interval would spin on the client.
            interval: Duration::from_secs(self.poller.interval_secs.max(1)),
            settle_delay: Duration::from_secs(self.poller.settle_delay_secs),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.connect.retry_delay_ms)
    }

    /// Builds the invoker for the configured client.
    pub fn invoker(&self) -> CliInvoker {
        CliInvoker::resolve(self.cli_path.as_deref()).with_path_prefix(self.path.clone())
    }
}
