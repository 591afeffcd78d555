// Numeric encodings used on the CI-V wire

pub mod bcd;

pub use bcd::{decode_frequency, encode_frequency, BcdError};
