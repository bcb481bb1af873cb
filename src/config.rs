//! Configuration loading and persistence.
//!
//! Reads the gateway and API endpoints, connection tunables and timeouts from
//! a JSON file, then applies environment overrides. The token is never
//! written to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants;
use crate::schema::Snowflake;

/// Connection tunables.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capacity of the bounded event queue.
    pub event_queue_capacity: usize,
    /// Ceiling for one inbound message, raw and inflated, in bytes.
    pub read_limit: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: constants::EVENT_QUEUE_CAPACITY,
            read_limit: constants::READ_LIMIT,
        }
    }
}

/// Configuration for gatewire.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    /// Gateway WebSocket URL.
    pub gateway_url: String,
    /// Base URL of the request/response API.
    pub api_url: String,
    /// Bot token - NOT serialized to disk.
    #[serde(skip)]
    pub token: String,
    /// Application whose commands the API client manages.
    pub application_id: Snowflake,
    /// Connection tunables.
    pub connection: ConnectionConfig,
    /// Dial timeout in seconds.
    pub dial_timeout_secs: u64,
    /// Per-request API timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: "wss://gateway.discord.gg/?v=9&encoding=json".to_string(),
            api_url: "https://discord.com/api/v9".to_string(),
            token: String::new(),
            application_id: Snowflake::default(),
            connection: ConnectionConfig::default(),
            dial_timeout_secs: constants::DIAL_TIMEOUT.as_secs(),
            request_timeout_secs: constants::HTTP_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Returns the default configuration file path.
    ///
    /// `GATEWIRE_CONFIG` overrides the platform config directory.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("GATEWIRE_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join("gatewire")
            .join("config.json"))
    }

    /// Loads configuration from the default path, with environment variable
    /// overrides. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from an explicit file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("GATEWIRE_GATEWAY_URL") {
            self.gateway_url = url;
        }

        if let Some(url) = var("GATEWIRE_API_URL") {
            self.api_url = url;
        }

        // Token from env var (for CI/CD)
        if let Some(token) = var("GATEWIRE_TOKEN") {
            self.token = token;
        }

        if let Some(id) = var("GATEWIRE_APPLICATION_ID").and_then(|v| v.parse().ok()) {
            self.application_id = id;
        }

        if let Some(capacity) = var("GATEWIRE_EVENT_QUEUE").and_then(|v| v.parse().ok()) {
            self.connection.event_queue_capacity = capacity;
        }

        if let Some(limit) = var("GATEWIRE_READ_LIMIT").and_then(|v| v.parse().ok()) {
            self.connection.read_limit = limit;
        }
    }

    /// Persists the configuration to `path`. The token is NOT saved.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Check if a token is configured.
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Dial timeout as a [`Duration`].
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    /// Per-request API timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
