//! Main application configuration
//!
//! Defines the service configuration, loading from TOML files and
//! environment variables, and validation.

use crate::config::lobby::LobbySettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub lobby: LobbySettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// How often registry stats are logged and pushed to metrics
    pub stats_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pug-lobby".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
            stats_interval_seconds: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_overrides(|key| env::var(key).ok())?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply overrides from a key lookup, normally the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        override_parsed(&lookup, "HEALTH_PORT", &mut self.service.health_port)?;
        override_parsed(
            &lookup,
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;
        override_parsed(
            &lookup,
            "STATS_INTERVAL_SECONDS",
            &mut self.service.stats_interval_seconds,
        )?;

        // Lobby settings
        override_parsed(&lookup, "LOBBY_ID_LENGTH", &mut self.lobby.lobby_id_length)?;
        override_parsed(
            &lookup,
            "OUTBOUND_QUEUE_CAPACITY",
            &mut self.lobby.outbound_queue_capacity,
        )?;
        override_parsed(&lookup, "ACTION_TIMEOUT_MS", &mut self.lobby.action_timeout_ms)?;
        override_parsed(
            &lookup,
            "SINGLE_LOBBY_PER_CLIENT",
            &mut self.lobby.single_lobby_per_client,
        )?;
        override_parsed(
            &lookup,
            "ALLOW_UNKNOWN_GAME_MODES",
            &mut self.lobby.allow_unknown_game_modes,
        )?;

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get stats reporting interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.service.stats_interval_seconds)
    }

    /// Get per-action timeout as Duration
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.lobby.action_timeout_ms)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.name.trim().is_empty() {
        return Err(anyhow!("Service name cannot be empty"));
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.stats_interval_seconds == 0 {
        return Err(anyhow!("Stats interval must be greater than 0"));
    }
    if config.lobby.action_timeout_ms == 0 {
        return Err(anyhow!("Action timeout must be greater than 0"));
    }

    // Validate lobby settings
    if !(4..=32).contains(&config.lobby.lobby_id_length) {
        return Err(anyhow!(
            "Lobby id length must be between 4 and 32, got {}",
            config.lobby.lobby_id_length
        ));
    }
    if config.lobby.outbound_queue_capacity == 0 {
        return Err(anyhow!("Outbound queue capacity must be greater than 0"));
    }

    Ok(())
}
