// Error taxonomy shared by the transaction engine and the radio control API

use crate::bitwise::bcd::BcdError;
use crate::civ::frame::FrameError;
use crate::core::config::ConfigError;
use crate::core::memory::MemoryError;
use crate::core::PowerState;
use crate::serial::SerialError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RadioError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Payload encoding error: {0}")]
    PayloadEncoding(String),

    #[error("Malformed BCD byte: {0:#04x}")]
    MalformedBcd(u8),

    #[error("Value {value} does not fit in {digits} digits")]
    ValueOutOfRange { value: u64, digits: usize },

    #[error("Radio rejected {0}")]
    RadioRejected(String),

    #[error("Radio stopped responding after {attempts} attempts (last known power: {last_known})")]
    RadioUnresponsive {
        last_known: PowerState,
        attempts: u32,
    },

    #[error("No reply after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Not connected")]
    NotConnected,

    #[error("A transaction is already outstanding")]
    Busy,

    #[error("Invalid memory address: {0}")]
    InvalidMemory(#[from] MemoryError),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RadioError {
    /// Transient failures the engine retries before giving up
    pub fn is_transient(&self) -> bool {
        matches!(self, RadioError::WriteTimeout(_) | RadioError::ReadTimeout(_))
    }

    /// Either flavor of retry exhaustion
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RadioError::Timeout { .. } | RadioError::RadioUnresponsive { .. }
        )
    }
}

impl From<SerialError> for RadioError {
    fn from(err: SerialError) -> Self {
        match err {
            SerialError::WriteTimeout(d) => RadioError::WriteTimeout(d),
            SerialError::ReadTimeout(d) => RadioError::ReadTimeout(d),
            SerialError::NotOpen => RadioError::NotConnected,
            other => RadioError::TransportUnavailable(other.to_string()),
        }
    }
}

impl From<BcdError> for RadioError {
    fn from(err: BcdError) -> Self {
        match err {
            BcdError::MalformedBcd(byte) => RadioError::MalformedBcd(byte),
            BcdError::ValueOutOfRange { value, digits } => {
                RadioError::ValueOutOfRange { value, digits }
            }
        }
    }
}

impl From<FrameError> for RadioError {
    fn from(err: FrameError) -> Self {
        RadioError::PayloadEncoding(err.to_string())
    }
}

pub type RadioResult<T> = std::result::Result<T, RadioError>;
