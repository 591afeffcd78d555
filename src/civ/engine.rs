// CI-V transaction engine
//
// Turns one logical command into a request/response exchange over the
// half-duplex bus: write the frame, skip its echo, match the reply, retry on
// timeout. Exactly one transaction is outstanding at a time; `submit` takes
// `&mut self` so a second caller cannot start another while one is in flight.

use super::commands::{Command, CommandSpec, CommandTable, ReplyKind};
use super::frame::{Frame, Received, BROADCAST_ADDR, PREAMBLE};
use crate::core::PowerState;
use crate::drivers::{RadioError, RadioResult};
use crate::serial::{ByteStream, SerialError, TransportSession};
use std::time::Duration;
use tokio::time::Instant;

/// Why the last transaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Timeout,
    RadioRejected,
    Transport,
    Protocol,
}

impl From<&RadioError> for FailureReason {
    fn from(err: &RadioError) -> Self {
        match err {
            RadioError::Timeout { .. }
            | RadioError::RadioUnresponsive { .. }
            | RadioError::ReadTimeout(_) => FailureReason::Timeout,
            RadioError::RadioRejected(_) => FailureReason::RadioRejected,
            RadioError::TransportUnavailable(_)
            | RadioError::WriteTimeout(_)
            | RadioError::NotConnected => FailureReason::Transport,
            _ => FailureReason::Protocol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    AwaitingEcho,
    AwaitingReply,
    /// The last transaction failed; a new one may be submitted
    Failed(FailureReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per command, including the first
    pub attempts: u32,
    /// Read deadline for each attempt
    pub read_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, read_timeout: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            read_timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

/// Outcome of a successful transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Written (and echoed, if the line echoes); nothing further was expected
    Sent,
    /// The radio answered OK
    Ack,
    /// The radio answered with data for the request's command
    Data(Frame),
}

/// Number of preamble bytes that wake a sleeping radio at `baud_rate`
pub fn wake_preamble_len(baud_rate: u32) -> usize {
    match baud_rate {
        115200 => 150,
        57600 => 75,
        38400 => 50,
        19200 => 25,
        9600 => 13,
        4800 => 7,
        1200 => 3,
        300 => 2,
        other => (other.div_ceil(768) as usize).max(2),
    }
}

pub struct TransactionEngine<S: ByteStream> {
    session: TransportSession<S>,
    table: CommandTable,
    radio_addr: u8,
    controller_addr: u8,
    policy: RetryPolicy,
    state: EngineState,
    power: PowerState,
}

impl<S: ByteStream> TransactionEngine<S> {
    pub fn new(
        session: TransportSession<S>,
        table: CommandTable,
        radio_addr: u8,
        controller_addr: u8,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            session,
            table,
            radio_addr,
            controller_addr,
            policy,
            state: EngineState::Idle,
            power: PowerState::Unknown,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn power_state(&self) -> PowerState {
        self.power
    }

    pub fn radio_address(&self) -> u8 {
        self.radio_addr
    }

    pub fn controller_address(&self) -> u8 {
        self.controller_addr
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Build a request frame for `command` addressed to this radio
    pub fn request(&self, command: Command, payload: &[u8]) -> RadioResult<Frame> {
        self.table
            .build(command, self.radio_addr, self.controller_addr, payload)
    }

    /// Run `command` with the reply kind its table entry declares
    pub async fn execute(&mut self, command: Command, payload: &[u8]) -> RadioResult<Reply> {
        let request = self.request(command, payload)?;
        let expect = self.table.spec(command)?.reply;
        self.submit(request, expect, self.policy).await
    }

    /// Submit one request and wait for the reply `expect` describes. The
    /// request must match a command table entry, payload included.
    pub async fn submit(
        &mut self,
        request: Frame,
        expect: ReplyKind,
        policy: RetryPolicy,
    ) -> RadioResult<Reply> {
        self.begin()?;
        let result = self.run(&request, expect, policy, None).await;
        self.finish(&result);
        result
    }

    /// Send the power-off command. The radio goes quiet straight away, so
    /// nothing beyond the echo is awaited.
    pub async fn power_off(&mut self) -> RadioResult<()> {
        let request = self.request(Command::PowerOff, &[])?;
        self.submit(request, ReplyKind::None, self.policy).await?;
        self.power = PowerState::Off;
        Ok(())
    }

    /// Wake a sleeping radio with a burst of preamble bytes, then power it on.
    ///
    /// The radio ignores frames while asleep, so each attempt resends the
    /// burst before the power-on frame. The burst itself is never matched
    /// against anything; only the power-on frame's echo and OK are.
    pub async fn wake_and_power_on(
        &mut self,
        baud_rate: u32,
        policy: RetryPolicy,
    ) -> RadioResult<()> {
        self.begin()?;
        let burst = vec![PREAMBLE; wake_preamble_len(baud_rate)];
        let result = match self.request(Command::PowerOn, &[]) {
            Ok(request) => self.run(&request, ReplyKind::Ack, policy, Some(burst.as_slice())).await,
            Err(e) => Err(e),
        };
        self.finish(&result);
        result?;

        self.power = PowerState::On;
        tracing::info!("Radio {:#04x} powered on", self.radio_addr);
        Ok(())
    }

    /// Return to idle after a transaction was abandoned mid-flight
    pub fn reset(&mut self) {
        if !matches!(self.state, EngineState::Idle) {
            tracing::debug!("Resetting engine from {:?}", self.state);
        }
        self.session.discard_input();
        self.state = EngineState::Idle;
    }

    /// Close the underlying transport
    pub fn close(&mut self) -> RadioResult<()> {
        self.session.close()?;
        Ok(())
    }

    fn begin(&mut self) -> RadioResult<()> {
        match self.state {
            EngineState::Idle | EngineState::Failed(_) => Ok(()),
            _ => Err(RadioError::Busy),
        }
    }

    fn finish(&mut self, result: &RadioResult<Reply>) {
        self.state = match result {
            Ok(reply) => {
                if matches!(reply, Reply::Ack | Reply::Data(_)) {
                    self.power = PowerState::On;
                }
                EngineState::Idle
            }
            Err(e) => {
                let reason = FailureReason::from(e);
                tracing::debug!("Transaction failed ({:?}): {}", reason, e);
                EngineState::Failed(reason)
            }
        };
    }

    async fn run(
        &mut self,
        request: &Frame,
        expect: ReplyKind,
        policy: RetryPolicy,
        wake_burst: Option<&[u8]>,
    ) -> RadioResult<Reply> {
        let spec = *self.table.check_frame(request)?;
        let bytes = request.encode()?;
        self.session.discard_input();
        let mut last_error = None;
        let mut reached_read = false;

        for attempt in 1..=policy.attempts {
            if attempt > 1 {
                tracing::warn!(
                    "No reply to command {:#04x}, retry {}/{}",
                    request.cmd,
                    attempt,
                    policy.attempts
                );
            }

            self.state = EngineState::AwaitingEcho;
            let outcome = match self.write_attempt(&bytes, wake_burst).await {
                Ok(()) => {
                    reached_read = true;
                    let deadline = Instant::now() + policy.read_timeout;
                    self.await_reply(request, &spec, expect, deadline, policy.read_timeout)
                        .await
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        // A write stall only wins if no attempt ever got as far as reading
        Err(match last_error {
            Some(e @ RadioError::WriteTimeout(_)) if !reached_read => e,
            _ => self.exhausted(policy.attempts),
        })
    }

    async fn write_attempt(&mut self, bytes: &[u8], wake_burst: Option<&[u8]>) -> RadioResult<()> {
        if let Some(burst) = wake_burst {
            tracing::debug!("Sending {}-byte wake-up preamble", burst.len());
            self.session.write_frame(burst).await?;
        }
        self.session.write_frame(bytes).await?;
        Ok(())
    }

    async fn await_reply(
        &mut self,
        request: &Frame,
        spec: &CommandSpec,
        expect: ReplyKind,
        deadline: Instant,
        read_timeout: Duration,
    ) -> RadioResult<Reply> {
        // Bytes dropped to resynchronize; reported if no reply follows them
        let mut corrupted: Vec<u8> = Vec::new();

        loop {
            let received = match self.session.read_frame(deadline, &self.table).await {
                Ok(received) => received,
                Err(SerialError::ReadTimeout(_)) if expect == ReplyKind::None => {
                    // Line without echo; nothing else was owed
                    return Ok(Reply::Sent);
                }
                Err(SerialError::ReadTimeout(_)) if !corrupted.is_empty() => {
                    return Err(RadioError::MalformedFrame(format!(
                        "no reply to command {:#04x}, discarded {:02X?}",
                        request.cmd, corrupted
                    )));
                }
                Err(SerialError::ReadTimeout(_)) => {
                    return Err(RadioError::ReadTimeout(read_timeout))
                }
                Err(e) => return Err(e.into()),
            };

            let frame = match received {
                Received::Frame(frame) => frame,
                Received::Malformed(bytes) => {
                    corrupted.extend_from_slice(&bytes);
                    continue;
                }
            };

            if self.state == EngineState::AwaitingEcho && frame == *request {
                if expect == ReplyKind::None {
                    return Ok(Reply::Sent);
                }
                tracing::trace!("Echo observed for command {:#04x}", request.cmd);
                self.state = EngineState::AwaitingReply;
                continue;
            }

            if frame.src != self.radio_addr
                || (frame.dst != self.controller_addr && frame.dst != BROADCAST_ADDR)
            {
                tracing::debug!(
                    "Ignoring frame {:#04x} -> {:#04x} cmd {:#04x}",
                    frame.src,
                    frame.dst,
                    frame.cmd
                );
                continue;
            }

            if frame.is_nak() {
                return Err(RadioError::RadioRejected(format!(
                    "command {:#04x}{}",
                    request.cmd,
                    request
                        .sub
                        .map(|sub| format!("/{:#04x}", sub))
                        .unwrap_or_default()
                )));
            }

            match expect {
                ReplyKind::Ack | ReplyKind::None if frame.is_ack() => return Ok(Reply::Ack),
                ReplyKind::Data if spec.matches(&frame) => {
                    return Ok(Reply::Data(frame));
                }
                _ => tracing::debug!(
                    "Discarding unsolicited frame cmd {:#04x} ({} data bytes)",
                    frame.cmd,
                    frame.data.len()
                ),
            }
        }
    }

    fn exhausted(&self, attempts: u32) -> RadioError {
        if self.power.is_on() {
            RadioError::RadioUnresponsive {
                last_known: self.power,
                attempts,
            }
        } else {
            RadioError::Timeout { attempts }
        }
    }
}
