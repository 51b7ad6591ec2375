//! Persisted device entries: a versioned flat key/value record per unit,
//! with the upgrade from older record versions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Record version written by this release.
pub const CURRENT_ENTRY_VERSION: u32 = 2;

pub const CONF_NAME: &str = "name";
pub const CONF_HOST_IP: &str = "host_ip";
pub const CONF_HOST_PORT: &str = "host_port";
pub const CONF_SLAVE_ID: &str = "slave_id";
pub const CONF_COM_TYPE: &str = "com_type";
pub const CONF_BOARD_TYPE: &str = "board_type";

const DEFAULT_COM_TYPE: &str = "tcp";
const DEFAULT_BOARD_TYPE: &str = "AURORA";

/// Serial line settings used by the controller's RTU interface.
const SERIAL_BAUD_RATE: u32 = 19200;
const SERIAL_DATA_BITS: u8 = 8;
const SERIAL_STOP_BITS: u8 = 1;

/// Errors raised while upgrading or interpreting an entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("entry '{entry_id}': missing key '{key}'")]
    MissingKey { entry_id: String, key: &'static str },

    #[error("entry '{entry_id}': invalid value for '{key}': {message}")]
    InvalidValue {
        entry_id: String,
        key: &'static str,
        message: String,
    },

    #[error("entry '{entry_id}': unsupported version {version}")]
    UnsupportedVersion { entry_id: String, version: u32 },

    #[error("entry '{entry_id}' is at version {version} and must be migrated first")]
    NotMigrated { entry_id: String, version: u32 },
}

/// A persisted device entry as supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Stable identifier assigned by the host
    pub entry_id: String,

    /// Record version (missing means the first layout)
    #[serde(default = "default_entry_version")]
    pub version: u32,

    /// Flat key/value data
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_entry_version() -> u32 {
    1
}

/// Serial parity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    #[default]
    Even,
    Odd,
}

/// Connection type and address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Modbus TCP connection
    Tcp {
        /// Host address (IP or hostname)
        host: String,
        /// TCP port
        port: u16,
    },
    /// Modbus RTU (serial) connection
    Rtu {
        /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
        port: String,
        baud_rate: u32,
        data_bits: u8,
        parity: Parity,
        stop_bits: u8,
    },
}

/// Typed view of an up-to-date entry, handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub name: String,
    pub board_type: String,
    /// Modbus unit/slave ID (1-247)
    pub unit_id: u8,
    pub connection: ConnectionConfig,
}

impl ConfigEntry {
    pub fn new(entry_id: impl Into<String>, version: u32, data: Map<String, Value>) -> Self {
        Self {
            entry_id: entry_id.into(),
            version,
            data,
        }
    }

    /// Upgrade the record to [`CURRENT_ENTRY_VERSION`].
    ///
    /// Keys introduced by later versions are added with their defaults; keys
    /// already present keep their value. Returns `true` if the record changed.
    pub fn migrate(&mut self) -> Result<bool, EntryError> {
        if self.version == 0 || self.version > CURRENT_ENTRY_VERSION {
            return Err(EntryError::UnsupportedVersion {
                entry_id: self.entry_id.clone(),
                version: self.version,
            });
        }

        let from = self.version;
        debug!(entry = %self.entry_id, version = from, "Migrating config entry");

        if self.version == 1 {
            self.data
                .entry(CONF_COM_TYPE)
                .or_insert_with(|| Value::from(DEFAULT_COM_TYPE));
            self.data
                .entry(CONF_BOARD_TYPE)
                .or_insert_with(|| Value::from(DEFAULT_BOARD_TYPE));
            self.version = 2;
        }

        if self.version != from {
            info!(
                entry = %self.entry_id,
                version = self.version,
                "Migration to version {} successful",
                self.version
            );
        }

        Ok(self.version != from)
    }

    /// Interpret the record's keys.
    pub fn settings(&self) -> Result<DeviceSettings, EntryError> {
        if self.version != CURRENT_ENTRY_VERSION {
            return Err(EntryError::NotMigrated {
                entry_id: self.entry_id.clone(),
                version: self.version,
            });
        }

        let name = self.required_str(CONF_NAME)?.to_string();
        if name.trim().is_empty() {
            return Err(self.invalid(CONF_NAME, "name cannot be empty"));
        }

        let slave_id = self.required_int(CONF_SLAVE_ID)?;
        let unit_id = u8::try_from(slave_id)
            .ok()
            .filter(|id| (1..=247).contains(id))
            .ok_or_else(|| self.invalid(CONF_SLAVE_ID, "slave_id must be 1-247"))?;

        let board_type = self
            .optional_str(CONF_BOARD_TYPE)?
            .unwrap_or(DEFAULT_BOARD_TYPE)
            .to_string();

        let com_type = self
            .optional_str(CONF_COM_TYPE)?
            .unwrap_or(DEFAULT_COM_TYPE)
            .to_lowercase();

        let connection = match com_type.as_str() {
            "tcp" => {
                let host = self.required_str(CONF_HOST_IP)?.to_string();
                let port = self.required_int(CONF_HOST_PORT)?;
                let port = u16::try_from(port)
                    .ok()
                    .filter(|port| *port != 0)
                    .ok_or_else(|| self.invalid(CONF_HOST_PORT, "port must be 1-65535"))?;
                ConnectionConfig::Tcp { host, port }
            }
            "serial" | "rtu" => ConnectionConfig::Rtu {
                port: self.required_str(CONF_HOST_PORT)?.to_string(),
                baud_rate: SERIAL_BAUD_RATE,
                data_bits: SERIAL_DATA_BITS,
                parity: Parity::Even,
                stop_bits: SERIAL_STOP_BITS,
            },
            other => {
                return Err(self.invalid(
                    CONF_COM_TYPE,
                    format!("unknown com_type '{}' (use tcp or serial)", other),
                ));
            }
        };

        Ok(DeviceSettings {
            name,
            board_type,
            unit_id,
            connection,
        })
    }

    fn invalid(&self, key: &'static str, message: impl Into<String>) -> EntryError {
        EntryError::InvalidValue {
            entry_id: self.entry_id.clone(),
            key,
            message: message.into(),
        }
    }

    fn optional_str(&self, key: &'static str) -> Result<Option<&str>, EntryError> {
        match self.data.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.invalid(key, format!("expected a string, got {}", other))),
        }
    }

    fn required_str(&self, key: &'static str) -> Result<&str, EntryError> {
        self.optional_str(key)?
            .ok_or_else(|| EntryError::MissingKey {
                entry_id: self.entry_id.clone(),
                key,
            })
    }

    /// Numeric keys are accepted as numbers or numeric strings.
    fn required_int(&self, key: &'static str) -> Result<i64, EntryError> {
        match self.data.get(key) {
            None | Some(Value::Null) => Err(EntryError::MissingKey {
                entry_id: self.entry_id.clone(),
                key,
            }),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| self.invalid(key, format!("expected an integer, got {}", n))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, format!("expected an integer, got '{}'", s))),
            Some(other) => Err(self.invalid(key, format!("expected an integer, got {}", other))),
        }
    }
}
