//! Daemon configuration loaded from a JSON file.
//!
//! Every key is optional; missing keys take the defaults below. A missing
//! file is not an error, an unreadable or malformed one is.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::kml::{DEFAULT_COORDINATE_PRECISION, MIN_COORDINATE_PRECISION};

pub const DEFAULT_CONFIG_PATH: &str = "mapfence.json";
const DEFAULT_SNAPSHOT_PATH: &str = "polygons.json";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTT_TOPIC: &str = "mapfence";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid configuration: {key} = '{value}' - {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Broker connection for the MQTT command channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Commands arrive on `<topic>/command`, verdicts leave on `<topic>/verdict`
    pub topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MQTT_PORT,
            topic: DEFAULT_MQTT_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decimal digits per coordinate in exported KML
    pub coordinate_precision: usize,
    /// JSON snapshot used by the `save` and `load` commands
    pub snapshot_path: PathBuf,
    /// Unix socket for remote commands; disabled when absent
    pub socket_path: Option<PathBuf>,
    /// MQTT command channel; disabled when absent
    pub mqtt: Option<MqttConfig>,
    /// `tracing` filter directive, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinate_precision: DEFAULT_COORDINATE_PRECISION,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            socket_path: None,
            mqtt: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load config from a JSON file, falling back to defaults if it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinate_precision < MIN_COORDINATE_PRECISION {
            return Err(ConfigError::InvalidValue {
                key: "coordinate_precision",
                value: self.coordinate_precision.to_string(),
                reason: "must be at least 6",
            });
        }
        if self.coordinate_precision > 15 {
            return Err(ConfigError::InvalidValue {
                key: "coordinate_precision",
                value: self.coordinate_precision.to_string(),
                reason: "must be at most 15",
            });
        }
        if let Some(mqtt) = &self.mqtt {
            if mqtt.host.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "mqtt.host",
                    value: mqtt.host.clone(),
                    reason: "must not be empty",
                });
            }
            if mqtt.topic.trim().is_empty() || mqtt.topic.contains(['#', '+']) {
                return Err(ConfigError::InvalidValue {
                    key: "mqtt.topic",
                    value: mqtt.topic.clone(),
                    reason: "must be a plain topic without wildcards",
                });
            }
        }
        Ok(())
    }
}
