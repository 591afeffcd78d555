// Serial transport for CI-V: the serialport crate behind a narrow
// byte-stream contract of deadline-bounded writes and reads, plus close.

use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Serial port unavailable: {0}")]
    Unavailable(String),

    #[error("Serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Read timed out after {0:?}")]
    ReadTimeout(Duration),

    #[error("Serial port is closed")]
    NotOpen,

    #[error("Invalid serial settings: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// The byte-stream contract the session is built on.
///
/// `read` returns as soon as at least one byte is available and fails with
/// [`SerialError::ReadTimeout`] if none arrive within `timeout`.
#[allow(async_fn_in_trait)]
pub trait ByteStream {
    async fn write_all(&mut self, buf: &[u8], timeout: Duration) -> Result<()>;

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release the underlying device. Closing twice is harmless.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Line settings for a CI-V port. Icom radios talk 8N1 without flow
/// control, so in practice only the baud rate varies.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub stop_bits: serialport::StopBits,
    pub parity: serialport::Parity,
    pub flow_control: serialport::FlowControl,

    /// How long one blocking driver read may wait before the deadline is rechecked
    pub poll_interval: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 19200,
            data_bits: serialport::DataBits::Eight,
            stop_bits: serialport::StopBits::One,
            parity: serialport::Parity::None,
            flow_control: serialport::FlowControl::None,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl SerialConfig {
    /// CI-V line settings at `baud_rate`
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the driver poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Serial port backed by the OS driver
pub struct SerialPort {
    port: Option<Box<dyn serialport::SerialPort>>,
    config: SerialConfig,
    port_name: String,
}

impl SerialPort {
    /// Open `port_name`. A missing or busy device is reported as `Unavailable`.
    pub fn open(port_name: &str, config: SerialConfig) -> Result<Self> {
        if config.baud_rate == 0 {
            return Err(SerialError::InvalidConfig("baud rate must be non-zero".into()));
        }

        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits)
            .stop_bits(config.stop_bits)
            .parity(config.parity)
            .flow_control(config.flow_control)
            .timeout(config.poll_interval)
            .open()
            .map_err(|e| SerialError::Unavailable(format!("{}: {}", port_name, e)))?;

        tracing::debug!("Opened {} at {} baud", port_name, config.baud_rate);

        Ok(Self {
            port: Some(port),
            config,
            port_name: port_name.to_string(),
        })
    }
}

impl ByteStream for SerialPort {
    async fn write_all(&mut self, buf: &[u8], timeout: Duration) -> Result<()> {
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;
        let deadline = Instant::now() + timeout;
        let mut written = 0;

        while written < buf.len() {
            match port.write(&buf[written..]) {
                Ok(0) => {
                    return Err(SerialError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "Port closed",
                    )))
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    if Instant::now() >= deadline {
                        return Err(SerialError::WriteTimeout(timeout));
                    }
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(SerialError::Io(e)),
            }
        }

        port.flush().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => SerialError::WriteTimeout(timeout),
            _ => SerialError::Io(e),
        })
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(SerialError::NotOpen)?;
        let deadline = Instant::now() + timeout;

        loop {
            match port.read(buf) {
                Ok(0) => {
                    return Err(SerialError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "Port closed",
                    )))
                }
                Ok(n) => return Ok(n),
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    if Instant::now() >= deadline {
                        return Err(SerialError::ReadTimeout(timeout));
                    }
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(SerialError::Io(e)),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            let _ = port.flush();
            tracing::debug!("Closed {} ({} baud)", self.port_name, self.config.baud_rate);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Names of the serial devices the OS reports, e.g. for `civ-ctl ports`
pub fn list_ports() -> Result<Vec<String>> {
    serialport::available_ports()
        .map_err(|e| SerialError::Unavailable(e.to_string()))?
        .into_iter()
        .map(|p| Ok(p.port_name))
        .collect()
}
