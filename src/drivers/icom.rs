// Icom CI-V radio control
//
// Typed operations on top of the transaction engine. Every operation returns
// NotConnected until a transport is attached, and validates its arguments
// before anything goes on the wire.

use crate::bitwise::bcd;
use crate::civ::commands::Command;
use crate::civ::engine::{EngineState, Reply, TransactionEngine};
use crate::civ::frame::Frame;
use crate::civ::mode::OperatingMode;
use crate::core::{Bank, MemoryAddress, PowerState, RadioConfig, TuningMode, Vfo};
use crate::drivers::registry::{get_model, RadioModel};
use crate::drivers::{RadioError, RadioResult};
use crate::serial::{ByteStream, SerialPort, TransportSession};

/// A CI-V radio reached over a byte stream (a serial port unless a test
/// attaches something else)
pub struct CivRadio<S: ByteStream = SerialPort> {
    model: RadioModel,
    config: RadioConfig,
    radio_addr: u8,
    engine: Option<TransactionEngine<S>>,
}

impl CivRadio<SerialPort> {
    /// Build a radio from a configuration, looking the model up by name
    pub fn from_config(config: RadioConfig) -> RadioResult<Self> {
        let model = get_model(&config.model)
            .ok_or_else(|| RadioError::Unsupported(format!("unknown model {}", config.model)))?;
        Self::new(model, config)
    }

    /// Open the configured serial port
    pub fn connect(&mut self) -> RadioResult<()> {
        let session = TransportSession::open(
            &self.config.port,
            self.config.serial_config(),
            self.config.write_timeout(),
        )?;
        tracing::info!(
            "Connected to {} on {} at {} baud",
            self.model.name,
            self.config.port,
            self.config.baud_rate
        );
        self.start(session);
        Ok(())
    }
}

impl<S: ByteStream> CivRadio<S> {
    pub fn new(model: RadioModel, config: RadioConfig) -> RadioResult<Self> {
        let radio_addr = config.radio_address.unwrap_or(model.address);
        config.validate(radio_addr)?;

        Ok(Self {
            model,
            config,
            radio_addr,
            engine: None,
        })
    }

    /// Use an already-open byte stream as the transport
    pub fn attach(&mut self, stream: S) {
        let session = TransportSession::new(stream, self.config.write_timeout());
        self.start(session);
    }

    fn start(&mut self, session: TransportSession<S>) {
        self.engine = Some(TransactionEngine::new(
            session,
            self.model.commands,
            self.radio_addr,
            self.config.controller_address,
            self.config.retry_policy(),
        ));
    }

    /// Close the transport. Session state, including power, is forgotten.
    pub fn disconnect(&mut self) -> RadioResult<()> {
        match self.engine.take() {
            Some(mut engine) => {
                tracing::debug!("Disconnecting from {}", self.model.name);
                engine.close()
            }
            None => Ok(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_open())
    }

    pub fn model(&self) -> &RadioModel {
        &self.model
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    pub fn radio_address(&self) -> u8 {
        self.radio_addr
    }

    /// Last-known power state; Unknown while disconnected
    pub fn power_state(&self) -> PowerState {
        self.engine
            .as_ref()
            .map(|engine| engine.power_state())
            .unwrap_or_default()
    }

    pub fn engine_state(&self) -> Option<EngineState> {
        self.engine.as_ref().map(|engine| engine.state())
    }

    /// Clear an abandoned transaction so new commands are accepted
    pub fn reset(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
    }

    fn engine(&mut self) -> RadioResult<&mut TransactionEngine<S>> {
        self.engine.as_mut().ok_or(RadioError::NotConnected)
    }

    async fn command(&mut self, command: Command, payload: &[u8]) -> RadioResult<()> {
        self.engine()?.execute(command, payload).await?;
        Ok(())
    }

    async fn query(&mut self, command: Command) -> RadioResult<Frame> {
        match self.engine()?.execute(command, &[]).await? {
            Reply::Data(frame) => Ok(frame),
            other => Err(RadioError::MalformedFrame(format!(
                "expected data for {}, got {:?}",
                command, other
            ))),
        }
    }

    /// Power the radio on (wake burst, then power-on) or off
    pub async fn power(&mut self, on: bool) -> RadioResult<()> {
        let baud_rate = self.config.baud_rate;
        let policy = self.config.power_on_policy();
        let engine = self.engine()?;

        if on {
            engine.wake_and_power_on(baud_rate, policy).await
        } else {
            engine.power_off().await?;
            tracing::info!("Radio {:#04x} powered off", engine.radio_address());
            Ok(())
        }
    }

    pub async fn select_vfo_or_memory(&mut self, mode: TuningMode) -> RadioResult<()> {
        let command = match mode {
            TuningMode::Vfo => Command::SelectVfoMode,
            TuningMode::Memory => Command::SelectMemoryMode,
        };
        self.command(command, &[]).await
    }

    pub async fn select_vfo(&mut self, vfo: Vfo) -> RadioResult<()> {
        let command = match vfo {
            Vfo::A => Command::SelectVfoA,
            Vfo::B => Command::SelectVfoB,
        };
        self.command(command, &[]).await
    }

    pub async fn select_memory_bank(&mut self, bank: Bank) -> RadioResult<()> {
        tracing::debug!("Selecting bank {}", bank);
        self.command(Command::SelectBank, &[bank.code()]).await
    }

    /// Select the address's bank, then its channel
    pub async fn select_memory_channel(&mut self, addr: MemoryAddress) -> RadioResult<()> {
        let payload = addr.channel.to_bcd()?;
        self.engine()?;

        tracing::debug!("Selecting memory {}", addr);
        self.select_memory_bank(addr.bank).await?;
        self.command(Command::SelectChannel, &payload).await
    }

    pub async fn set_frequency(&mut self, hz: u64) -> RadioResult<()> {
        let payload = bcd::encode_frequency(hz, self.model.frequency_digits)?;
        self.command(Command::SetFrequency, &payload).await
    }

    pub async fn get_frequency(&mut self) -> RadioResult<u64> {
        let frame = self.query(Command::ReadFrequency).await?;
        let expected = self.model.frequency_digits.div_ceil(2);
        if frame.data().is_empty() || frame.data().len() > expected {
            return Err(RadioError::MalformedFrame(format!(
                "frequency reply has {} bytes, expected at most {}",
                frame.data().len(),
                expected
            )));
        }
        Ok(bcd::decode_frequency(frame.data())?)
    }

    /// Set the operating mode; modes the model does not list are refused
    /// without I/O
    pub async fn set_mode(&mut self, mode: impl Into<OperatingMode>) -> RadioResult<()> {
        let mode = mode.into();
        if !self.model.supports_mode(mode.mode) {
            return Err(RadioError::Unsupported(format!(
                "{} does not support mode {}",
                self.model.name, mode.mode
            )));
        }
        self.command(Command::SetMode, &mode.to_bytes()).await
    }

    /// Read the operating mode; codes outside the mode table come back as
    /// `Mode::Unknown`
    pub async fn get_mode(&mut self) -> RadioResult<OperatingMode> {
        let frame = self.query(Command::ReadMode).await?;
        OperatingMode::from_bytes(frame.data())
            .ok_or_else(|| RadioError::MalformedFrame("empty mode reply".into()))
    }

    /// Switch between transmit and receive
    pub async fn transmit(&mut self, on: bool) -> RadioResult<()> {
        tracing::debug!("Setting {}", if on { "TX" } else { "RX" });
        self.command(Command::SetTransmit, &[u8::from(on)]).await
    }

    pub async fn is_transmitting(&mut self) -> RadioResult<bool> {
        let frame = self.query(Command::ReadTransmit).await?;
        match frame.data() {
            [0x00] => Ok(false),
            [0x01] => Ok(true),
            other => Err(RadioError::MalformedFrame(format!(
                "unexpected transmit state {:02X?}",
                other
            ))),
        }
    }
}
