// Data-driven CI-V command table
//
// Each model supplies a table mapping command names to their wire codes,
// payload shape and reply kind. Supporting a new model with different codes
// means supplying a new table rather than new code paths.

use super::frame::{Frame, FrameLayout};
use crate::bitwise::bcd;
use crate::drivers::{RadioError, RadioResult};
use std::fmt;

/// Logical commands in the supported subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    PowerOff,
    PowerOn,
    SelectVfoMode,
    SelectVfoA,
    SelectVfoB,
    SelectMemoryMode,
    SelectBank,
    SelectChannel,
    SetFrequency,
    ReadFrequency,
    SetMode,
    ReadMode,
    SetTransmit,
    ReadTransmit,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What the payload of a command must look like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Empty,
    /// Packed decimal bytes, length within `min..=max`
    Bcd { min: usize, max: usize },
}

/// What the radio sends back once the command is understood
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Nothing beyond the echo, e.g. power off
    None,
    /// An OK frame
    Ack,
    /// A frame carrying the same command code and the requested data
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: Command,
    pub code: u8,
    pub sub: Option<u8>,
    pub payload: PayloadShape,
    pub reply: ReplyKind,
}

impl CommandSpec {
    const fn new(
        command: Command,
        code: u8,
        sub: Option<u8>,
        payload: PayloadShape,
        reply: ReplyKind,
    ) -> Self {
        Self {
            command,
            code,
            sub,
            payload,
            reply,
        }
    }

    /// Whether `frame` carries this command's code and sub-command
    pub fn matches(&self, frame: &Frame) -> bool {
        frame.cmd == self.code && frame.sub == self.sub
    }

    fn check_payload(&self, payload: &[u8]) -> RadioResult<()> {
        match self.payload {
            PayloadShape::Empty if payload.is_empty() => Ok(()),
            PayloadShape::Empty => Err(RadioError::PayloadEncoding(format!(
                "{} takes no payload, got {} bytes",
                self.command,
                payload.len()
            ))),
            PayloadShape::Bcd { min, max } => {
                if payload.len() < min || payload.len() > max {
                    return Err(RadioError::PayloadEncoding(format!(
                        "{} takes {}-{} payload bytes, got {}",
                        self.command,
                        min,
                        max,
                        payload.len()
                    )));
                }
                match payload.iter().find(|&&b| !bcd::is_valid_bcd(b)) {
                    Some(bad) => Err(RadioError::PayloadEncoding(format!(
                        "{} payload byte {:#04x} is not packed decimal",
                        self.command, bad
                    ))),
                    None => Ok(()),
                }
            }
        }
    }
}

const fn packed(min: usize, max: usize) -> PayloadShape {
    PayloadShape::Bcd { min, max }
}

/// Command set shared by the current Icom transceivers
pub const ICOM_COMMANDS: &[CommandSpec] = &[
    CommandSpec::new(Command::PowerOff, 0x18, Some(0x00), PayloadShape::Empty, ReplyKind::None),
    CommandSpec::new(Command::PowerOn, 0x18, Some(0x01), PayloadShape::Empty, ReplyKind::Ack),
    CommandSpec::new(Command::SelectVfoMode, 0x07, None, PayloadShape::Empty, ReplyKind::Ack),
    CommandSpec::new(Command::SelectVfoA, 0x07, Some(0x00), PayloadShape::Empty, ReplyKind::Ack),
    CommandSpec::new(Command::SelectVfoB, 0x07, Some(0x01), PayloadShape::Empty, ReplyKind::Ack),
    CommandSpec::new(Command::SelectMemoryMode, 0x08, None, PayloadShape::Empty, ReplyKind::Ack),
    CommandSpec::new(Command::SelectBank, 0x08, Some(0xA0), packed(1, 1), ReplyKind::Ack),
    CommandSpec::new(Command::SelectChannel, 0x08, None, packed(2, 2), ReplyKind::Ack),
    CommandSpec::new(Command::SetFrequency, 0x05, None, packed(5, 5), ReplyKind::Ack),
    CommandSpec::new(Command::ReadFrequency, 0x03, None, PayloadShape::Empty, ReplyKind::Data),
    CommandSpec::new(Command::SetMode, 0x06, None, packed(1, 2), ReplyKind::Ack),
    CommandSpec::new(Command::ReadMode, 0x04, None, PayloadShape::Empty, ReplyKind::Data),
    CommandSpec::new(Command::SetTransmit, 0x1C, Some(0x00), packed(1, 1), ReplyKind::Ack),
    CommandSpec::new(Command::ReadTransmit, 0x1C, Some(0x00), PayloadShape::Empty, ReplyKind::Data),
];

/// A model's command table
#[derive(Debug, Clone, Copy)]
pub struct CommandTable {
    specs: &'static [CommandSpec],
}

impl CommandTable {
    pub const fn new(specs: &'static [CommandSpec]) -> Self {
        Self { specs }
    }

    pub fn spec(&self, command: Command) -> RadioResult<&CommandSpec> {
        self.specs
            .iter()
            .find(|spec| spec.command == command)
            .ok_or_else(|| RadioError::Unsupported(format!("{} is not in the command table", command)))
    }

    pub fn supports(&self, command: Command) -> bool {
        self.specs.iter().any(|spec| spec.command == command)
    }

    /// Find the entry a request frame belongs to, checking its payload.
    ///
    /// Several entries can share a code and sub-command (the transmit set and
    /// read, for instance); the first whose payload shape accepts the frame wins.
    pub fn check_frame(&self, frame: &Frame) -> RadioResult<&CommandSpec> {
        let mut result = Err(RadioError::Unsupported(format!(
            "command {:#04x} is not in the command table",
            frame.cmd
        )));
        for spec in self.specs.iter().filter(|spec| spec.matches(frame)) {
            match spec.check_payload(frame.data()) {
                Ok(()) => return Ok(spec),
                Err(e) => result = Err(e),
            }
        }
        result
    }

    /// Build a validated request frame for `command`
    pub fn build(&self, command: Command, dst: u8, src: u8, payload: &[u8]) -> RadioResult<Frame> {
        let spec = self.spec(command)?;
        spec.check_payload(payload)?;
        Ok(Frame::new(dst, src, spec.code, spec.sub).with_data(payload))
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new(ICOM_COMMANDS)
    }
}

impl FrameLayout for CommandTable {
    fn has_sub_command(&self, cmd: u8, rest: &[u8]) -> bool {
        rest.first().is_some_and(|&first| {
            self.specs
                .iter()
                .any(|spec| spec.code == cmd && spec.sub == Some(first))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civ::frame::{decode, DecodeResult};

    fn table() -> CommandTable {
        CommandTable::default()
    }

    #[test]
    fn test_build_frames() {
        let frame = table().build(Command::ReadFrequency, 0x88, 0xE0, &[]).unwrap();
        assert_eq!(frame.encode().unwrap(), vec![0xFE, 0xFE, 0x88, 0xE0, 0x03, 0xFD]);

        let frame = table().build(Command::SelectBank, 0x88, 0xE0, &[0x05]).unwrap();
        assert_eq!(
            frame.encode().unwrap(),
            vec![0xFE, 0xFE, 0x88, 0xE0, 0x08, 0xA0, 0x05, 0xFD]
        );

        let frame = table().build(Command::PowerOn, 0x88, 0xE0, &[]).unwrap();
        assert_eq!(frame.encode().unwrap(), vec![0xFE, 0xFE, 0x88, 0xE0, 0x18, 0x01, 0xFD]);
    }

    #[test]
    fn test_payload_validation() {
        assert!(matches!(
            table().build(Command::SetFrequency, 0x88, 0xE0, &[0x00, 0x00, 0x52, 0x46]),
            Err(RadioError::PayloadEncoding(_))
        ));
        assert!(matches!(
            table().build(Command::SetFrequency, 0x88, 0xE0, &[0x00, 0x00, 0x5A, 0x46, 0x01]),
            Err(RadioError::PayloadEncoding(_))
        ));
        assert!(matches!(
            table().build(Command::ReadMode, 0x88, 0xE0, &[0x01]),
            Err(RadioError::PayloadEncoding(_))
        ));
    }

    #[test]
    fn test_unsupported_command() {
        const POWER_ONLY: &[CommandSpec] = &[CommandSpec::new(
            Command::PowerOn,
            0x18,
            Some(0x01),
            PayloadShape::Empty,
            ReplyKind::Ack,
        )];
        let table = CommandTable::new(POWER_ONLY);
        assert!(table.supports(Command::PowerOn));
        assert!(!table.supports(Command::SetMode));
        assert!(matches!(
            table.build(Command::SetMode, 0x88, 0xE0, &[0x05]),
            Err(RadioError::Unsupported(_))
        ));
    }

    #[test]
    fn test_check_frame() {
        let table = table();

        let read_tx = Frame::new(0x88, 0xE0, 0x1C, Some(0x00));
        assert_eq!(table.check_frame(&read_tx).unwrap().command, Command::ReadTransmit);

        let set_tx = read_tx.clone().with_data(vec![0x01]);
        assert_eq!(table.check_frame(&set_tx).unwrap().command, Command::SetTransmit);

        let channel = Frame::new(0x88, 0xE0, 0x08, None).with_data(vec![0x00, 0x42]);
        assert_eq!(table.check_frame(&channel).unwrap().command, Command::SelectChannel);

        let not_packed = Frame::new(0x88, 0xE0, 0x06, None).with_data(vec![0xA5]);
        assert!(matches!(
            table.check_frame(&not_packed),
            Err(RadioError::PayloadEncoding(_))
        ));

        let unknown = Frame::new(0x88, 0xE0, 0x25, None);
        assert!(matches!(table.check_frame(&unknown), Err(RadioError::Unsupported(_))));
    }

    #[test]
    fn test_layout_splits_sub_commands() {
        let table = table();
        assert!(table.has_sub_command(0x08, &[0xA0, 0x01]));
        assert!(!table.has_sub_command(0x08, &[0x00, 0x42]));
        assert!(!table.has_sub_command(0x08, &[]));
        assert!(table.has_sub_command(0x1C, &[0x00, 0x01]));
        assert!(!table.has_sub_command(0x03, &[0x00, 0x00, 0x52, 0x46, 0x01]));
    }

    #[test]
    fn test_every_command_round_trips() {
        let table = table();
        let payloads: &[(Command, &[u8])] = &[
            (Command::PowerOff, &[]),
            (Command::PowerOn, &[]),
            (Command::SelectVfoMode, &[]),
            (Command::SelectVfoA, &[]),
            (Command::SelectVfoB, &[]),
            (Command::SelectMemoryMode, &[]),
            (Command::SelectBank, &[0x03]),
            (Command::SelectChannel, &[0x00, 0x42]),
            (Command::SelectChannel, &[0x01, 0x05]),
            (Command::SetFrequency, &[0x00, 0x00, 0x52, 0x46, 0x01]),
            (Command::ReadFrequency, &[]),
            (Command::SetMode, &[0x05, 0x01]),
            (Command::ReadMode, &[]),
            (Command::SetTransmit, &[0x01]),
            (Command::ReadTransmit, &[]),
        ];

        for (command, payload) in payloads {
            let frame = table.build(*command, 0x94, 0xE0, payload).unwrap();
            let bytes = frame.encode().unwrap();
            assert_eq!(
                decode(&bytes, &table),
                DecodeResult::Frame(frame.clone(), bytes.len()),
                "{}",
                command
            );
            assert!(table.spec(*command).unwrap().matches(&frame));
        }
    }
}
