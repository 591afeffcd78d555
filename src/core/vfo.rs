// VFO and memory operating selections

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the radio tunes from the VFO or from a stored memory channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuningMode {
    Vfo,
    Memory,
}

/// VFO A or B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vfo {
    A,
    B,
}

impl fmt::Display for Vfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vfo::A => write!(f, "A"),
            Vfo::B => write!(f, "B"),
        }
    }
}

impl FromStr for Vfo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Vfo::A),
            "B" => Ok(Vfo::B),
            _ => Err(format!("Invalid VFO: {} (expected A or B)", s)),
        }
    }
}
