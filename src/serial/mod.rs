// Serial transport: byte-stream contract, serialport backend and frame session
pub mod comm;
pub mod session;

#[cfg(test)]
pub mod mock;

pub use comm::{list_ports, ByteStream, SerialConfig, SerialError, SerialPort};
pub use session::TransportSession;
