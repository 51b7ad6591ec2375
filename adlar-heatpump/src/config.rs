//! Configuration for the heat-pump bridge.

use adlar_common::config::{LoggingConfig, ZenohConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::entry::{ConfigEntry, DeviceSettings, EntryError};
use crate::transport::TransportOptions;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Invalid entry: {0}")]
    Entry(#[from] EntryError),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdlarBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Heat-pump settings
    pub adlar: AdlarConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Heat-pump integration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdlarConfig {
    /// Key expression prefix (default: "adlar")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Delay before retrying a device that was not ready, in seconds
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry count on failed reads
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Persisted device entries
    pub entries: Vec<ConfigEntry>,
}

fn default_key_prefix() -> String {
    adlar_common::KEY_PREFIX.to_string()
}

fn default_retry_interval() -> u64 {
    30
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_retries() -> u32 {
    3
}

impl AdlarConfig {
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            retries: self.retries,
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    /// Upgrade every entry to the current record version.
    ///
    /// Returns the ids of the entries that changed.
    pub fn migrate_entries(&mut self) -> Result<Vec<String>, EntryError> {
        let mut migrated = Vec::new();
        for entry in &mut self.entries {
            if entry.migrate()? {
                migrated.push(entry.entry_id.clone());
            }
        }
        Ok(migrated)
    }

    /// Entry ids paired with their typed settings.
    pub fn device_settings(&self) -> Result<Vec<(String, DeviceSettings)>, EntryError> {
        self.entries
            .iter()
            .map(|entry| Ok((entry.entry_id.clone(), entry.settings()?)))
            .collect()
    }
}

impl AdlarBridgeConfig {
    /// Parse a JSON5 file without migrating or validating it.
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(content)?)
    }

    /// Load, migrate and validate a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::read_from_file(path)?;
        config.prepare()?;
        Ok(config)
    }

    /// Migrate entries and validate the result.
    ///
    /// Returns the ids of the migrated entries.
    pub fn prepare(&mut self) -> Result<Vec<String>, ConfigError> {
        let migrated = self.adlar.migrate_entries()?;
        self.validate()?;
        Ok(migrated)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.adlar.entries.is_empty() {
            return Err(ConfigError::Validation(
                "At least one entry must be configured".to_string(),
            ));
        }

        if self.adlar.key_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "key_prefix cannot be empty".to_string(),
            ));
        }

        if self.adlar.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.adlar.entries {
            if !seen.insert(entry.entry_id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate entry_id '{}'",
                    entry.entry_id
                )));
            }
            entry.settings()?;
        }

        Ok(())
    }
}
