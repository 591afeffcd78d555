// CIV-RS: controller for Icom transceivers over the CI-V serial protocol

pub mod bitwise;
pub mod civ;
pub mod core;
pub mod drivers;
pub mod serial;

// Re-export commonly used types
pub use bitwise::{decode_frequency, encode_frequency, BcdError};
pub use civ::{Command, CommandTable, EngineState, Filter, Frame, Mode, OperatingMode, Reply};
pub use self::core::{Bank, Channel, MemoryAddress, PowerState, RadioConfig, SpecialChannel, TuningMode, Vfo};
pub use drivers::{get_model, list_models, CivRadio, RadioError, RadioModel, RadioResult};
pub use serial::{SerialConfig, SerialPort};

/// CIV-RS version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
