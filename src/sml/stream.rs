//! # SML Transport Framing
//!
//! SML messages arrive on the optical port framed by escape sequences:
//! `1B 1B 1B 1B 01 01 01 01` opens a file and `1B 1B 1B 1B 1A xx yy zz`
//! closes it (fill count and CRC, which are not checked here). Bytes are
//! pushed in whatever chunks the UART delivers and complete messages are cut
//! out of the bounded buffer.

use crate::constants::{SML_END_SEQUENCE_PREFIX, SML_END_TRAILER_LENGTH, SML_START_SEQUENCE};
use crate::util::iobuffer::{IoBuffer, IoBufferStats};

pub const DEFAULT_STREAM_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
pub struct SmlStream {
    buffer: IoBuffer,
}

impl Default for SmlStream {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}

impl SmlStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: IoBuffer::new(capacity),
        }
    }

    /// Append received bytes. Returns how many old bytes had to be dropped.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let dropped = self.buffer.write(data);
        if dropped > 0 {
            log::warn!("SML buffer full, dropped {dropped} oldest bytes");
        }
        dropped
    }

    /// Cut the next complete message body out of the buffer.
    ///
    /// The returned bytes are those strictly between the start sequence and
    /// the end escape. Everything up to and including the end trailer is
    /// removed, including any garbage before the start sequence. When no
    /// complete message is buffered yet nothing is removed.
    pub fn extract_message(&mut self) -> Option<Vec<u8>> {
        let start = self.buffer.find_pattern(0, &SML_START_SEQUENCE)?;
        let body_start = start + SML_START_SEQUENCE.len();
        let end = self.buffer.find_pattern(body_start, &SML_END_SEQUENCE_PREFIX)?;
        let frame_end = end + SML_END_SEQUENCE_PREFIX.len() + SML_END_TRAILER_LENGTH;
        if self.buffer.len() < frame_end {
            return None;
        }

        let message = self.buffer.peek_range(body_start, end - body_start);
        self.buffer.consume(frame_end);
        if start > 0 {
            log::debug!("Skipped {start} bytes before SML start sequence");
        }
        Some(message)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn stats(&self) -> IoBufferStats {
        self.buffer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut data = SML_START_SEQUENCE.to_vec();
        data.extend_from_slice(body);
        data.extend_from_slice(&SML_END_SEQUENCE_PREFIX);
        data.extend_from_slice(&[0x00, 0xAB, 0xCD]);
        data
    }

    #[test]
    fn test_extracts_body_and_consumes_frame() {
        let mut stream = SmlStream::default();
        stream.push(&[0x42, 0x42]);
        stream.push(&framed(&[0x76, 0x05, 0x01]));
        stream.push(&[0x1B]);

        assert_eq!(stream.extract_message(), Some(vec![0x76, 0x05, 0x01]));
        assert_eq!(stream.len(), 1);
        assert_eq!(stream.extract_message(), None);
    }

    #[test]
    fn test_no_start_sequence_leaves_buffer_untouched() {
        let mut stream = SmlStream::default();
        stream.push(&[0x1B, 0x1B, 0x1B, 0x1B, 0x1A, 0x00, 0x00, 0x00]);
        for _ in 0..3 {
            assert_eq!(stream.extract_message(), None);
            assert_eq!(stream.len(), 8);
        }
    }

    #[test]
    fn test_waits_for_trailer() {
        let mut stream = SmlStream::default();
        let data = framed(&[0x01]);
        stream.push(&data[..data.len() - 2]);
        assert_eq!(stream.extract_message(), None);
        assert_eq!(stream.len(), data.len() - 2);

        stream.push(&data[data.len() - 2..]);
        assert_eq!(stream.extract_message(), Some(vec![0x01]));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_two_messages_in_one_chunk() {
        let mut stream = SmlStream::default();
        let mut data = framed(&[0x01]);
        data.extend(framed(&[0x02, 0x03]));
        stream.push(&data);

        assert_eq!(stream.extract_message(), Some(vec![0x01]));
        assert_eq!(stream.extract_message(), Some(vec![0x02, 0x03]));
        assert_eq!(stream.extract_message(), None);
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut stream = SmlStream::new(16);
        assert_eq!(stream.push(&[0u8; 20]), 4);
        assert_eq!(stream.len(), 16);
        assert_eq!(stream.stats().bytes_dropped, 4);
    }
}
