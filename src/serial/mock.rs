// Mock serial port for testing without hardware
//
// Behaves like a radio on a single-wire CI-V bus: every write can be echoed
// back, and each complete frame written releases the next queued reply.

use super::comm::{ByteStream, Result, SerialError};
use crate::civ::frame::TERMINATOR;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    /// Bytes waiting to be read (simulates radio output)
    read_buffer: VecDeque<u8>,
    /// Every write, in order
    writes: Vec<Vec<u8>>,
    /// Replies released one per complete frame written; empty means silence
    replies: VecDeque<Vec<u8>>,
    echo: bool,
    chunk_size: Option<usize>,
    /// Writes after this many completed ones never finish
    stall_after: Option<usize>,
    closed: bool,
    close_count: usize,
}

/// Mock serial port; clones share state so a test can inspect it after
/// handing the port to a session
#[derive(Clone, Default)]
pub struct MockSerialPort {
    state: Arc<Mutex<MockState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port that does not echo
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo every write back, as a radio on a shared CI-V line does
    pub fn with_echo(self) -> Self {
        self.state.lock().unwrap().echo = true;
        self
    }

    /// Let every write hang, as a wedged USB adapter does
    pub fn with_write_stall(self) -> Self {
        self.with_write_stall_after(0)
    }

    /// Complete the first `count` writes, then hang on every later one
    pub fn with_write_stall_after(self, count: usize) -> Self {
        self.state.lock().unwrap().stall_after = Some(count);
        self
    }

    /// Deliver at most `size` bytes per read
    pub fn with_chunk_size(self, size: usize) -> Self {
        self.state.lock().unwrap().chunk_size = Some(size.max(1));
        self
    }

    /// Push data to be read (simulates radio sending data)
    pub fn push_read_data(&self, data: &[u8]) {
        self.state.lock().unwrap().read_buffer.extend(data);
    }

    /// Queue a reply released by the next complete frame written
    pub fn queue_reply(&self, reply: &[u8]) {
        self.state.lock().unwrap().replies.push_back(reply.to_vec());
    }

    /// Queue an OK frame from `radio` to `controller`
    pub fn queue_ack(&self, radio: u8, controller: u8) {
        self.queue_reply(&[0xFE, 0xFE, controller, radio, 0xFB, 0xFD]);
    }

    /// Queue an NG frame from `radio` to `controller`
    pub fn queue_nak(&self, radio: u8, controller: u8) {
        self.queue_reply(&[0xFE, 0xFE, controller, radio, 0xFA, 0xFD]);
    }

    /// Let the next frame written go unanswered
    pub fn queue_silence(&self) {
        self.queue_reply(&[]);
    }

    /// Every write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// All written bytes concatenated
    pub fn written_data(&self) -> Vec<u8> {
        self.state.lock().unwrap().writes.concat()
    }

    /// Check if a specific byte sequence was written
    pub fn was_written(&self, expected: &[u8]) -> bool {
        self.written_data()
            .windows(expected.len())
            .any(|window| window == expected)
    }

    /// Get number of bytes available to read
    pub fn bytes_available(&self) -> usize {
        self.state.lock().unwrap().read_buffer.len()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().close_count
    }
}

impl ByteStream for MockSerialPort {
    async fn write_all(&mut self, buf: &[u8], _timeout: Duration) -> Result<()> {
        let stalled = {
            let state = self.state.lock().unwrap();
            if state.closed {
                return Err(SerialError::NotOpen);
            }
            state
                .stall_after
                .is_some_and(|count| state.writes.len() >= count)
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();

        state.writes.push(buf.to_vec());
        if state.echo {
            state.read_buffer.extend(buf);
        }
        if buf.last() == Some(&TERMINATOR) {
            let reply = state.replies.pop_front().unwrap_or_default();
            state.read_buffer.extend(reply);
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let count = {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(SerialError::NotOpen);
            }

            let limit = state.chunk_size.unwrap_or(buf.len()).min(buf.len());
            let mut count = 0;
            while count < limit {
                match state.read_buffer.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            count
        };

        if count == 0 {
            // Nothing on the line: the full deadline elapses
            tokio::time::sleep(timeout).await;
            return Err(SerialError::ReadTimeout(timeout));
        }
        Ok(count)
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
            state.closed = true;
            state.close_count += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.state.lock().unwrap().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_mock_serial_basic() {
        let mut port = MockSerialPort::new();
        port.push_read_data(b"Hello");

        let mut buf = [0u8; 8];
        let n = port.read(&mut buf, TIMEOUT).await.unwrap();
        assert_eq!(&buf[..n], b"Hello");

        port.write_all(b"World", TIMEOUT).await.unwrap();
        assert_eq!(port.written_data(), b"World");
        assert!(port.was_written(b"orl"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_serial_timeout() {
        let mut port = MockSerialPort::new();
        let start = tokio::time::Instant::now();

        let mut buf = [0u8; 5];
        let result = port.read(&mut buf, TIMEOUT).await;
        assert!(matches!(result, Err(SerialError::ReadTimeout(_))));
        assert_eq!(start.elapsed(), TIMEOUT);
    }

    #[tokio::test]
    async fn test_echo_and_reply() {
        let mut port = MockSerialPort::new().with_echo();
        port.queue_ack(0x88, 0xE0);

        // A bare burst releases no reply
        port.write_all(&[0xFE, 0xFE], TIMEOUT).await.unwrap();
        assert_eq!(port.bytes_available(), 2);

        let frame = [0xFE, 0xFE, 0x88, 0xE0, 0x07, 0xFD];
        port.write_all(&frame, TIMEOUT).await.unwrap();
        assert_eq!(port.bytes_available(), 2 + frame.len() + 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_stall() {
        let mut port = MockSerialPort::new().with_write_stall_after(1);
        port.write_all(&[0x01], TIMEOUT).await.unwrap();

        let stalled = tokio::time::timeout(TIMEOUT, port.write_all(&[0x02], TIMEOUT)).await;
        assert!(stalled.is_err());
        assert_eq!(port.writes(), vec![vec![0x01]]);
    }

    #[tokio::test]
    async fn test_chunked_reads() {
        let mut port = MockSerialPort::new().with_chunk_size(3);
        port.push_read_data(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 16];
        assert_eq!(port.read(&mut buf, TIMEOUT).await.unwrap(), 3);
        assert_eq!(port.read(&mut buf, TIMEOUT).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[tokio::test]
    async fn test_close() {
        let mut port = MockSerialPort::new();
        let observer = port.clone();

        port.close().unwrap();
        port.close().unwrap();
        assert!(!observer.is_open());
        assert_eq!(observer.close_count(), 1);
        assert!(matches!(
            port.write_all(&[0x00], TIMEOUT).await,
            Err(SerialError::NotOpen)
        ));
    }
}
