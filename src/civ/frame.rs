// CI-V frame codec
//
// Wire format: 0xFE 0xFE <dst> <src> <cmd> [sub] [data...] 0xFD
//
// There is no length field. A frame is delimited by the two-byte preamble and
// the terminator, so neither sentinel may appear inside a frame body.

use thiserror::Error;

/// Start sentinel, sent twice at the start of every frame
pub const PREAMBLE: u8 = 0xFE;

/// Stop sentinel
pub const TERMINATOR: u8 = 0xFD;

/// Positive acknowledgement command byte
pub const ACK: u8 = 0xFB;

/// Negative acknowledgement command byte
pub const NAK: u8 = 0xFA;

/// Destination address that every device on the bus accepts
pub const BROADCAST_ADDR: u8 = 0x00;

/// Longest body accepted before the decoder gives up on a frame
pub const MAX_FRAME_LEN: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Byte {byte:#04x} at offset {offset} collides with a frame sentinel")]
    PayloadEncoding { offset: usize, byte: u8 },
}

/// A logical CI-V frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub dst: u8,
    pub src: u8,
    pub cmd: u8,
    pub sub: Option<u8>,
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame with an empty payload
    pub fn new(dst: u8, src: u8, cmd: u8, sub: Option<u8>) -> Self {
        Self {
            dst,
            src,
            cmd,
            sub,
            data: Vec::new(),
        }
    }

    /// Builder-style payload setter
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Get the frame data payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_ack(&self) -> bool {
        self.cmd == ACK && self.sub.is_none() && self.data.is_empty()
    }

    pub fn is_nak(&self) -> bool {
        self.cmd == NAK && self.sub.is_none() && self.data.is_empty()
    }

    /// Encode to wire bytes, refusing any body byte equal to a sentinel
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut frame = Vec::with_capacity(6 + self.sub.is_some() as usize + self.data.len());
        frame.extend_from_slice(&[PREAMBLE, PREAMBLE, self.dst, self.src, self.cmd]);
        if let Some(sub) = self.sub {
            frame.push(sub);
        }
        frame.extend_from_slice(&self.data);

        if let Some(offset) = frame[2..]
            .iter()
            .position(|&b| b == PREAMBLE || b == TERMINATOR)
        {
            return Err(FrameError::PayloadEncoding {
                offset: offset + 2,
                byte: frame[offset + 2],
            });
        }

        frame.push(TERMINATOR);
        Ok(frame)
    }
}

/// Tells the decoder whether the first body byte after `cmd` is a sub-command.
///
/// The wire format does not say, so this comes from the command table.
pub trait FrameLayout {
    fn has_sub_command(&self, cmd: u8, rest: &[u8]) -> bool;
}

/// Result of attempting to decode one frame from a byte buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete frame and the number of bytes consumed, including any
    /// garbage skipped before its preamble
    Frame(Frame, usize),

    /// No terminator yet; read more bytes
    Incomplete,

    /// The stream desynchronized; discard this many bytes and resynchronize
    Malformed(usize),
}

fn find_preamble(buf: &[u8]) -> Option<usize> {
    buf.windows(2)
        .position(|w| w[0] == PREAMBLE && w[1] == PREAMBLE)
}

/// Decode the first frame in `buf`.
///
/// Bytes before the first preamble are skipped. Extra preamble bytes (such as
/// the echo of a wake-up burst) are accepted as a longer preamble. A preamble
/// byte appearing inside a frame body means the stream lost sync.
pub fn decode(buf: &[u8], layout: &impl FrameLayout) -> DecodeResult {
    let start = match find_preamble(buf) {
        Some(pos) => pos,
        None => return DecodeResult::Incomplete,
    };

    let mut body_start = start + 2;
    while body_start < buf.len() && buf[body_start] == PREAMBLE {
        body_start += 1;
    }

    let end = match buf[body_start..]
        .iter()
        .position(|&b| b == TERMINATOR || b == PREAMBLE)
    {
        Some(rel) => body_start + rel,
        None if buf.len() - body_start > MAX_FRAME_LEN => {
            return DecodeResult::Malformed(buf.len());
        }
        None => return DecodeResult::Incomplete,
    };

    if buf[end] == PREAMBLE {
        return DecodeResult::Malformed(end);
    }

    let body = &buf[body_start..end];
    if body.len() < 3 {
        return DecodeResult::Malformed(end + 1);
    }

    let (dst, src, cmd) = (body[0], body[1], body[2]);
    let rest = &body[3..];
    let (sub, data) = if !rest.is_empty() && layout.has_sub_command(cmd, rest) {
        (Some(rest[0]), rest[1..].to_vec())
    } else {
        (None, rest.to_vec())
    };

    DecodeResult::Frame(
        Frame {
            dst,
            src,
            cmd,
            sub,
            data,
        },
        end + 1,
    )
}

/// Something pulled off the byte stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Frame(Frame),
    /// Bytes discarded while resynchronizing
    Malformed(Vec<u8>),
}

/// Accumulates bytes that arrive in arbitrary chunks and yields frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes held back waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Pull the next frame or malformed run out of the buffer, if any
    pub fn next_frame(&mut self, layout: &impl FrameLayout) -> Option<Received> {
        match decode(&self.buf, layout) {
            DecodeResult::Frame(frame, consumed) => {
                self.buf.drain(..consumed);
                Some(Received::Frame(frame))
            }
            DecodeResult::Malformed(consumed) => {
                Some(Received::Malformed(self.buf.drain(..consumed).collect()))
            }
            DecodeResult::Incomplete => {
                // Drop leading noise but keep anything that may start a frame
                match find_preamble(&self.buf) {
                    Some(pos) => {
                        self.buf.drain(..pos);
                    }
                    None => {
                        let keep_last = self.buf.last() == Some(&PREAMBLE);
                        let len = self.buf.len();
                        self.buf.drain(..len - keep_last as usize);
                    }
                }
                None
            }
        }
    }
}
