// Core radio state: configuration, memory addressing, power and VFO selection
pub mod config;
pub mod memory;
pub mod power;
pub mod vfo;

// Re-export commonly used types
pub use config::{ConfigError, RadioConfig};
pub use memory::{Bank, Channel, MemoryAddress, MemoryError, SpecialChannel};
pub use power::PowerState;
pub use vfo::{TuningMode, Vfo};
