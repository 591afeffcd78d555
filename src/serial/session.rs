// Transport session: frame-level I/O on top of a raw byte stream
//
// Owns the stream exclusively and closes it on every exit path. Bytes read
// past the end of one frame, or before a deadline expired, stay buffered for
// the next call.

use super::comm::{ByteStream, Result, SerialConfig, SerialError, SerialPort};
use crate::civ::frame::{FrameDecoder, FrameLayout, Received};
use std::time::Duration;
use tokio::time::Instant;

const READ_CHUNK: usize = 64;

pub struct TransportSession<S: ByteStream> {
    stream: S,
    decoder: FrameDecoder,
    write_timeout: Duration,
}

impl TransportSession<SerialPort> {
    /// Open a serial port and wrap it in a session
    pub fn open(port_name: &str, config: SerialConfig, write_timeout: Duration) -> Result<Self> {
        let port = SerialPort::open(port_name, config)?;
        Ok(Self::new(port, write_timeout))
    }
}

impl<S: ByteStream> TransportSession<S> {
    /// Adopt an already-open byte stream
    pub fn new(stream: S, write_timeout: Duration) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
            write_timeout,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Write an encoded frame, failing with `WriteTimeout` if it cannot be
    /// flushed in time
    pub async fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        tracing::trace!("TX {:02X?}", bytes);
        match tokio::time::timeout(
            self.write_timeout,
            self.stream.write_all(bytes, self.write_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SerialError::WriteTimeout(self.write_timeout)),
        }
    }

    /// Read until a frame or a malformed run is available, or `deadline` passes
    pub async fn read_frame(
        &mut self,
        deadline: Instant,
        layout: &impl FrameLayout,
    ) -> Result<Received> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(received) = self.decoder.next_frame(layout) {
                if let Received::Malformed(ref bytes) = received {
                    tracing::debug!("Discarding {} bytes to resynchronize: {:02X?}", bytes.len(), bytes);
                }
                return Ok(received);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SerialError::ReadTimeout(remaining));
            }

            match self.stream.read(&mut chunk, remaining).await {
                Ok(n) => {
                    tracing::trace!("RX {:02X?}", &chunk[..n]);
                    self.decoder.push(&chunk[..n]);
                }
                Err(SerialError::ReadTimeout(_)) => {
                    return Err(SerialError::ReadTimeout(remaining));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop anything buffered but not yet decoded
    pub fn discard_input(&mut self) {
        if self.decoder.buffered() > 0 {
            tracing::debug!("Discarding {} buffered bytes", self.decoder.buffered());
        }
        self.decoder.clear();
    }

    /// Bytes received but not yet part of a complete frame
    pub fn buffered(&self) -> usize {
        self.decoder.buffered()
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    /// Close the stream now rather than when the session is dropped
    pub fn close(&mut self) -> Result<()> {
        self.decoder.clear();
        self.stream.close()
    }
}

impl<S: ByteStream> Drop for TransportSession<S> {
    fn drop(&mut self) {
        if let Err(e) = self.stream.close() {
            tracing::warn!("Error closing transport: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civ::commands::CommandTable;
    use crate::civ::frame::Frame;
    use crate::serial::mock::MockSerialPort;

    const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

    fn deadline(ms: u64) -> Instant {
        Instant::now() + Duration::from_millis(ms)
    }

    #[tokio::test]
    async fn test_write_frame() {
        let port = MockSerialPort::new();
        let mut session = TransportSession::new(port.clone(), WRITE_TIMEOUT);

        session
            .write_frame(&[0xFE, 0xFE, 0x88, 0xE0, 0x03, 0xFD])
            .await
            .unwrap();
        assert_eq!(port.writes(), vec![vec![0xFE, 0xFE, 0x88, 0xE0, 0x03, 0xFD]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_frame_times_out() {
        let port = MockSerialPort::new().with_write_stall();
        let mut session = TransportSession::new(port.clone(), WRITE_TIMEOUT);

        let start = Instant::now();
        let result = session.write_frame(&[0xFE, 0xFE, 0x88, 0xE0, 0x03, 0xFD]).await;
        assert!(matches!(result, Err(SerialError::WriteTimeout(d)) if d == WRITE_TIMEOUT));
        assert_eq!(start.elapsed(), WRITE_TIMEOUT);
        assert!(port.writes().is_empty());
    }

    #[tokio::test]
    async fn test_read_frame_split_across_chunks() {
        let port = MockSerialPort::new().with_chunk_size(4);
        port.push_read_data(&[0xFE, 0xFE, 0xE0, 0x88, 0x03, 0x00, 0x00, 0x52, 0x46, 0x01, 0xFD]);
        let mut session = TransportSession::new(port, WRITE_TIMEOUT);

        let received = session
            .read_frame(deadline(100), &CommandTable::default())
            .await
            .unwrap();
        assert_eq!(
            received,
            Received::Frame(
                Frame::new(0xE0, 0x88, 0x03, None).with_data(vec![0x00, 0x00, 0x52, 0x46, 0x01])
            )
        );
        assert_eq!(session.buffered(), 0);
    }

    #[tokio::test]
    async fn test_back_to_back_frames() {
        let port = MockSerialPort::new();
        port.push_read_data(&[
            0xFE, 0xFE, 0x88, 0xE0, 0x07, 0xFD, 0xFE, 0xFE, 0xE0, 0x88, 0xFB, 0xFD,
        ]);
        let mut session = TransportSession::new(port, WRITE_TIMEOUT);
        let table = CommandTable::default();

        let first = session.read_frame(deadline(100), &table).await.unwrap();
        assert_eq!(first, Received::Frame(Frame::new(0x88, 0xE0, 0x07, None)));
        assert_eq!(session.buffered(), 6);

        match session.read_frame(deadline(100), &table).await.unwrap() {
            Received::Frame(frame) => assert!(frame.is_ack()),
            other => panic!("expected ack, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_frame_survives_timeout() {
        let port = MockSerialPort::new();
        port.push_read_data(&[0xFE, 0xFE, 0xE0, 0x88, 0x04]);
        let mut session = TransportSession::new(port.clone(), WRITE_TIMEOUT);
        let table = CommandTable::default();

        let start = Instant::now();
        let result = session.read_frame(deadline(50), &table).await;
        assert!(matches!(result, Err(SerialError::ReadTimeout(_))));
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(session.buffered(), 5);

        port.push_read_data(&[0x05, 0x01, 0xFD]);
        let received = session.read_frame(deadline(50), &table).await.unwrap();
        assert_eq!(
            received,
            Received::Frame(Frame::new(0xE0, 0x88, 0x04, None).with_data(vec![0x05, 0x01]))
        );
    }

    #[tokio::test]
    async fn test_malformed_then_resync() {
        let port = MockSerialPort::new();
        port.push_read_data(&[0xFE, 0xFE, 0xE0, 0x88, 0xFE, 0xFE, 0xE0, 0x88, 0xFB, 0xFD]);
        let mut session = TransportSession::new(port, WRITE_TIMEOUT);
        let table = CommandTable::default();

        assert!(matches!(
            session.read_frame(deadline(100), &table).await.unwrap(),
            Received::Malformed(_)
        ));
        assert!(matches!(
            session.read_frame(deadline(100), &table).await.unwrap(),
            Received::Frame(_)
        ));
    }

    #[tokio::test]
    async fn test_close_on_drop() {
        let port = MockSerialPort::new();
        {
            let session = TransportSession::new(port.clone(), WRITE_TIMEOUT);
            assert!(session.is_open());
        }
        assert!(!port.is_open());
        assert_eq!(port.close_count(), 1);
    }

    #[tokio::test]
    async fn test_explicit_close_then_drop_closes_once() {
        let port = MockSerialPort::new();
        let mut session = TransportSession::new(port.clone(), WRITE_TIMEOUT);
        session.close().unwrap();
        drop(session);
        assert_eq!(port.close_count(), 1);
    }
}
