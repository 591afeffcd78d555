// Last-known radio power state as seen by this process

use serde::{Deserialize, Serialize};
use std::fmt;

/// Power state tracked by the session, never read back from the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    /// No successful exchange yet
    #[default]
    Unknown,
    On,
    Off,
}

impl PowerState {
    pub fn is_on(self) -> bool {
        self == PowerState::On
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PowerState::Unknown => "unknown",
            PowerState::On => "on",
            PowerState::Off => "off",
        };
        write!(f, "{}", label)
    }
}
