// Packed binary-coded decimal (BCD) codec
// CI-V carries frequencies, channels and table values as packed decimal nibbles

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BcdError {
    #[error("Malformed BCD byte: {0:#04x}")]
    MalformedBcd(u8),

    #[error("Value {value} does not fit in {digits} BCD digits")]
    ValueOutOfRange { value: u64, digits: usize },
}

pub type Result<T> = std::result::Result<T, BcdError>;

/// Split a packed byte into its (high, low) decimal digits, e.g. 0x46 -> (4, 6)
pub fn bcd_byte_to_digits(byte: u8) -> Result<(u8, u8)> {
    let tens = (byte & 0xF0) >> 4;
    let ones = byte & 0x0F;

    if tens > 9 || ones > 9 {
        return Err(BcdError::MalformedBcd(byte));
    }

    Ok((tens, ones))
}

/// Convert a value 0-99 to a single BCD byte
pub fn u8_to_bcd(value: u8) -> Result<u8> {
    if value > 99 {
        return Err(BcdError::ValueOutOfRange {
            value: value as u64,
            digits: 2,
        });
    }

    Ok(((value / 10) << 4) | (value % 10))
}

/// Returns true if both nibbles of `byte` are decimal digits
pub fn is_valid_bcd(byte: u8) -> bool {
    bcd_byte_to_digits(byte).is_ok()
}

/// Decode least-significant-pair-first packed decimal, as in
/// `[0x00, 0x00, 0x52, 0x46, 0x01]` -> 146520000
pub fn bcd_to_int_le(bytes: &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    let mut digits = 0;

    for &byte in bytes.iter().rev() {
        let (tens, ones) = bcd_byte_to_digits(byte)?;
        digits += 2;
        value = value
            .checked_mul(100)
            .and_then(|v| v.checked_add((tens * 10 + ones) as u64))
            .ok_or(BcdError::ValueOutOfRange { value, digits })?;
    }

    Ok(value)
}

/// Most-significant-pair-first encoding, used for channel numbers
/// (99 -> `[0x00, 0x99]`)
pub fn int_to_bcd_be(value: u64, num_bytes: usize) -> Result<Vec<u8>> {
    let mut result = int_to_bcd_le(value, num_bytes)?;
    result.reverse();
    Ok(result)
}

/// Least-significant-pair-first encoding into exactly `num_bytes` bytes
pub fn int_to_bcd_le(value: u64, num_bytes: usize) -> Result<Vec<u8>> {
    let mut packed = vec![0u8; num_bytes];
    let mut remaining = value;

    for byte in packed.iter_mut() {
        *byte = u8_to_bcd((remaining % 100) as u8)?;
        remaining /= 100;
    }

    if remaining > 0 {
        return Err(BcdError::ValueOutOfRange {
            value,
            digits: num_bytes * 2,
        });
    }

    Ok(packed)
}

/// Encode a frequency in Hz as least-significant-first packed decimal.
///
/// `digit_width` is the number of decimal digits the radio accepts (10 for
/// every current Icom transceiver, i.e. five bytes). A frequency needing more
/// digits is rejected rather than truncated.
pub fn encode_frequency(hz: u64, digit_width: usize) -> Result<Vec<u8>> {
    if digit_width < 20 && hz >= 10u64.pow(digit_width as u32) {
        return Err(BcdError::ValueOutOfRange {
            value: hz,
            digits: digit_width,
        });
    }

    int_to_bcd_le(hz, digit_width.div_ceil(2))
}

/// Decode a least-significant-first packed decimal frequency into Hz
pub fn decode_frequency(bytes: &[u8]) -> Result<u64> {
    bcd_to_int_le(bytes)
}
