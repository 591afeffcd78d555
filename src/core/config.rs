// Session configuration, loadable from JSON

use crate::civ::engine::RetryPolicy;
use crate::civ::frame::{BROADCAST_ADDR, PREAMBLE, TERMINATOR};
use crate::serial::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Standard PC controller CI-V address
pub const DEFAULT_CONTROLLER_ADDR: u8 = 0xE0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything needed to open a session to one radio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Serial device, e.g. /dev/ttyUSB0 or COM3
    pub port: String,

    /// Model name as registered in the model registry, e.g. "IC-7100"
    pub model: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_controller_address")]
    pub controller_address: u8,

    /// Overrides the model's default CI-V address
    #[serde(default)]
    pub radio_address: Option<u8>,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Attempts per command, including the first
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Read deadline for the power-on exchange, which waits out the boot
    #[serde(default = "default_power_on_timeout_ms")]
    pub power_on_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    19200
}

fn default_controller_address() -> u8 {
    DEFAULT_CONTROLLER_ADDR
}

fn default_read_timeout_ms() -> u64 {
    200
}

fn default_write_timeout_ms() -> u64 {
    500
}

fn default_retries() -> u32 {
    3
}

fn default_power_on_timeout_ms() -> u64 {
    2000
}

impl RadioConfig {
    /// Create a configuration with default timing for the given port and model
    pub fn new(port: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            model: model.into(),
            baud_rate: default_baud_rate(),
            controller_address: default_controller_address(),
            radio_address: None,
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            retries: default_retries(),
            power_on_timeout_ms: default_power_on_timeout_ms(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the configuration against the radio address it will talk to
    pub fn validate(&self, radio_address: u8) -> Result<()> {
        let reserved = [PREAMBLE, TERMINATOR];

        if reserved.contains(&self.controller_address) || self.controller_address == BROADCAST_ADDR
        {
            return Err(ConfigError::Invalid(format!(
                "controller address {:#04x} is reserved",
                self.controller_address
            )));
        }
        if reserved.contains(&radio_address) {
            return Err(ConfigError::Invalid(format!(
                "radio address {:#04x} is reserved",
                radio_address
            )));
        }
        if self.controller_address == radio_address {
            return Err(ConfigError::Invalid(format!(
                "controller and radio share address {:#04x}",
                radio_address
            )));
        }
        if self.retries == 0 {
            return Err(ConfigError::Invalid("retries must be at least 1".into()));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 || self.power_on_timeout_ms == 0
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud rate must be non-zero".into()));
        }

        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.read_timeout())
    }

    pub fn power_on_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.power_on_timeout_ms))
    }

    /// Serial settings for the port (8N1, no flow control, as CI-V expects)
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config =
            RadioConfig::from_json(r#"{"port": "/dev/ttyUSB0", "model": "IC-7100"}"#).unwrap();
        assert_eq!(config, RadioConfig::new("/dev/ttyUSB0", "IC-7100"));
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.controller_address, 0xE0);
        assert_eq!(config.retry_policy().attempts, 3);
        assert_eq!(config.read_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = RadioConfig::new("COM3", "IC-9700");
        config.radio_address = Some(0x70);
        config.retries = 5;

        let json = config.to_json().unwrap();
        assert_eq!(RadioConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"port": "/dev/ttyACM0", "model": "IC-705", "baud_rate": 115200}"#)
            .unwrap();

        let config = RadioConfig::load(file.path()).unwrap();
        assert_eq!(config.model, "IC-705");
        assert_eq!(config.serial_config().baud_rate, 115200);

        assert!(matches!(
            RadioConfig::load("/nonexistent/civ.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_validate() {
        let config = RadioConfig::new("/dev/ttyUSB0", "IC-7100");
        assert!(config.validate(0x88).is_ok());
        assert!(config.validate(0xE0).is_err());
        assert!(config.validate(0xFD).is_err());

        let mut bad = config.clone();
        bad.controller_address = 0xFE;
        assert!(bad.validate(0x88).is_err());

        let mut bad = config.clone();
        bad.retries = 0;
        assert!(bad.validate(0x88).is_err());

        let mut bad = config;
        bad.read_timeout_ms = 0;
        assert!(bad.validate(0x88).is_err());
    }
}
