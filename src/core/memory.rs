// Memory bank and channel addressing

use crate::bitwise::bcd;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest regular memory channel number
pub const MAX_CHANNEL: u8 = 99;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Invalid memory bank: {0}")]
    InvalidBank(String),

    #[error("Invalid memory channel: {0}")]
    InvalidChannel(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Memory bank A-E
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bank {
    A,
    B,
    C,
    D,
    E,
}

impl Bank {
    pub const ALL: [Bank; 5] = [Bank::A, Bank::B, Bank::C, Bank::D, Bank::E];

    /// Wire value sent with the bank-select command (A = 0x01 ... E = 0x05)
    pub fn code(self) -> u8 {
        match self {
            Bank::A => 0x01,
            Bank::B => 0x02,
            Bank::C => 0x03,
            Bank::D => 0x04,
            Bank::E => 0x05,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|bank| bank.code() == code)
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Bank::A => 'A',
            Bank::B => 'B',
            Bank::C => 'C',
            Bank::D => 'D',
            Bank::E => 'E',
        };
        write!(f, "{}", letter)
    }
}

impl FromStr for Bank {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Bank::A),
            "B" => Ok(Bank::B),
            "C" => Ok(Bank::C),
            "D" => Ok(Bank::D),
            "E" => Ok(Bank::E),
            _ => Err(MemoryError::InvalidBank(s.to_string())),
        }
    }
}

/// Named special channels (program scan edges and call channels)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialChannel {
    P1A,
    P1B,
    P2A,
    P2B,
    P3A,
    P3B,
    Call144C1,
    Call144C2,
    Call430C1,
    Call430C2,
}

impl SpecialChannel {
    pub const ALL: [SpecialChannel; 10] = [
        SpecialChannel::P1A,
        SpecialChannel::P1B,
        SpecialChannel::P2A,
        SpecialChannel::P2B,
        SpecialChannel::P3A,
        SpecialChannel::P3B,
        SpecialChannel::Call144C1,
        SpecialChannel::Call144C2,
        SpecialChannel::Call430C1,
        SpecialChannel::Call430C2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialChannel::P1A => "1A",
            SpecialChannel::P1B => "1B",
            SpecialChannel::P2A => "2A",
            SpecialChannel::P2B => "2B",
            SpecialChannel::P3A => "3A",
            SpecialChannel::P3B => "3B",
            SpecialChannel::Call144C1 => "144-C1",
            SpecialChannel::Call144C2 => "144-C2",
            SpecialChannel::Call430C1 => "430-C1",
            SpecialChannel::Call430C2 => "430-C2",
        }
    }

    /// Channel number as the radio counts it: specials follow on from 100
    fn number(self) -> u16 {
        100 + Self::ALL.iter().position(|c| *c == self).unwrap_or(0) as u16
    }
}

/// A channel within a bank: a numbered channel or one of the specials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Number(u8),
    Special(SpecialChannel),
}

impl Channel {
    pub fn validate(&self) -> Result<()> {
        match self {
            Channel::Number(n) if (1..=MAX_CHANNEL).contains(n) => Ok(()),
            Channel::Number(n) => Err(MemoryError::InvalidChannel(format!(
                "{} (must be 1-{})",
                n, MAX_CHANNEL
            ))),
            Channel::Special(_) => Ok(()),
        }
    }

    /// Two-byte big-endian BCD channel payload (0001-0099, specials 0100-0109)
    pub fn to_bcd(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let number = match self {
            Channel::Number(n) => *n as u16,
            Channel::Special(special) => special.number(),
        };
        bcd::int_to_bcd_be(number as u64, 2)
            .map_err(|e| MemoryError::InvalidChannel(e.to_string()))
    }
}

impl From<SpecialChannel> for Channel {
    fn from(special: SpecialChannel) -> Self {
        Channel::Special(special)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Number(n) => write!(f, "{}", n),
            Channel::Special(special) => write!(f, "{}", special.name()),
        }
    }
}

impl FromStr for Channel {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            let channel = Channel::Number(n);
            channel.validate()?;
            return Ok(channel);
        }

        SpecialChannel::ALL
            .into_iter()
            .find(|special| special.name().eq_ignore_ascii_case(s))
            .map(Channel::Special)
            .ok_or_else(|| MemoryError::InvalidChannel(s.to_string()))
    }
}

/// A (bank, channel) pair, validated as a unit before anything is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryAddress {
    pub bank: Bank,
    pub channel: Channel,
}

impl MemoryAddress {
    pub fn new(bank: Bank, channel: Channel) -> Result<Self> {
        let addr = Self { bank, channel };
        addr.validate()?;
        Ok(addr)
    }

    pub fn validate(&self) -> Result<()> {
        self.channel.validate()
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bank, self.channel)
    }
}
