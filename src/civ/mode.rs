// Operating mode lookup table
//
// Mode and filter are sent as one byte each. Codes the table does not list
// decode to an explicit Unknown variant so model-specific modes survive a
// read without being mistaken for a supported one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Lsb,
    Usb,
    Am,
    Cw,
    Rtty,
    Fm,
    Wfm,
    CwR,
    RttyR,
    Dv,
    Unknown(u8),
}

/// Wire code and display name for every known mode
const MODE_TABLE: &[(Mode, u8, &str)] = &[
    (Mode::Lsb, 0x00, "LSB"),
    (Mode::Usb, 0x01, "USB"),
    (Mode::Am, 0x02, "AM"),
    (Mode::Cw, 0x03, "CW"),
    (Mode::Rtty, 0x04, "RTTY"),
    (Mode::Fm, 0x05, "FM"),
    (Mode::Wfm, 0x06, "WFM"),
    (Mode::CwR, 0x07, "CW-R"),
    (Mode::RttyR, 0x08, "RTTY-R"),
    (Mode::Dv, 0x17, "DV"),
];

impl Mode {
    pub const KNOWN: [Mode; 10] = [
        Mode::Lsb,
        Mode::Usb,
        Mode::Am,
        Mode::Cw,
        Mode::Rtty,
        Mode::Fm,
        Mode::Wfm,
        Mode::CwR,
        Mode::RttyR,
        Mode::Dv,
    ];

    /// Wire code; `Unknown` round-trips its raw byte
    pub fn code(self) -> u8 {
        match self {
            Mode::Unknown(raw) => raw,
            known => MODE_TABLE
                .iter()
                .find(|(mode, _, _)| *mode == known)
                .map(|(_, code, _)| *code)
                .unwrap_or_default(),
        }
    }

    pub fn from_code(code: u8) -> Self {
        MODE_TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(mode, _, _)| *mode)
            .unwrap_or(Mode::Unknown(code))
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Mode::Unknown(_))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Unknown(raw) => write!(f, "Unknown({:#04x})", raw),
            known => {
                let name = MODE_TABLE
                    .iter()
                    .find(|(mode, _, _)| mode == known)
                    .map(|(_, _, name)| *name)
                    .unwrap_or("?");
                write!(f, "{}", name)
            }
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('_', "-");
        let wanted = match wanted.as_str() {
            "CWR" => "CW-R".to_string(),
            "RTTYR" => "RTTY-R".to_string(),
            _ => wanted,
        };
        MODE_TABLE
            .iter()
            .find(|(_, _, name)| *name == wanted)
            .map(|(mode, _, _)| *mode)
            .ok_or_else(|| format!("Unknown mode: {}", s))
    }
}

/// IF filter selection that accompanies the mode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    Fil1,
    Fil2,
    Fil3,
    Unknown(u8),
}

impl Filter {
    pub fn code(self) -> u8 {
        match self {
            Filter::Fil1 => 0x01,
            Filter::Fil2 => 0x02,
            Filter::Fil3 => 0x03,
            Filter::Unknown(raw) => raw,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Filter::Fil1,
            0x02 => Filter::Fil2,
            0x03 => Filter::Fil3,
            raw => Filter::Unknown(raw),
        }
    }
}

/// A mode plus optional filter, as carried by the mode set/read commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperatingMode {
    pub mode: Mode,
    pub filter: Option<Filter>,
}

impl OperatingMode {
    pub fn new(mode: Mode) -> Self {
        Self { mode, filter: None }
    }

    pub fn with_filter(mode: Mode, filter: Filter) -> Self {
        Self {
            mode,
            filter: Some(filter),
        }
    }

    /// One or two payload bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.mode.code()];
        if let Some(filter) = self.filter {
            bytes.push(filter.code());
        }
        bytes
    }

    /// Decode a mode reply payload; `None` if it is empty
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&mode, rest) = bytes.split_first()?;
        Some(Self {
            mode: Mode::from_code(mode),
            filter: rest.first().copied().map(Filter::from_code),
        })
    }
}

impl From<Mode> for OperatingMode {
    fn from(mode: Mode) -> Self {
        Self::new(mode)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.filter {
            Some(Filter::Unknown(raw)) => write!(f, "{} FIL?({:#04x})", self.mode, raw),
            Some(filter) => write!(f, "{} FIL{}", self.mode, filter.code()),
            None => write!(f, "{}", self.mode),
        }
    }
}
