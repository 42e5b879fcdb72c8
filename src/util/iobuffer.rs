//! # IoBuffer - Bounded Streaming Buffer
//!
//! A fixed-capacity FIFO byte buffer for data arriving from a serial line in
//! arbitrary chunks. When a write would exceed the capacity the oldest bytes
//! are dropped, so a meter that never sends a recognizable frame cannot grow
//! the buffer without bound.
//!
//! ## Usage
//!
//! ```rust
//! use metering_rs::util::IoBuffer;
//!
//! let mut buffer = IoBuffer::new(4);
//! buffer.write(&[0x01, 0x02, 0x03]);
//! let dropped = buffer.write(&[0x04, 0x05]);
//! assert_eq!(dropped, 1);
//! assert_eq!(buffer.consume(2), vec![0x02, 0x03]);
//! ```

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct IoBuffer {
    data: VecDeque<u8>,
    capacity: usize,
    bytes_written: u64,
    bytes_consumed: u64,
    bytes_dropped: u64,
}

impl IoBuffer {
    /// Create a buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
            bytes_written: 0,
            bytes_consumed: 0,
            bytes_dropped: 0,
        }
    }

    /// Append data, dropping the oldest bytes on overflow.
    ///
    /// Returns the number of bytes dropped from the front.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.bytes_written += data.len() as u64;

        // Only the newest `capacity` bytes of the input can survive anyway.
        let skipped = data.len().saturating_sub(self.capacity);
        let data = &data[skipped..];

        let overflow = (self.data.len() + data.len()).saturating_sub(self.capacity);
        self.data.drain(..overflow);
        self.data.extend(data);

        let dropped = overflow + skipped;
        self.bytes_dropped += dropped as u64;
        dropped
    }

    /// Remove and return up to `count` bytes from the front.
    pub fn consume(&mut self, count: usize) -> Vec<u8> {
        let to_consume = count.min(self.data.len());
        let result: Vec<u8> = self.data.drain(..to_consume).collect();
        self.bytes_consumed += result.len() as u64;
        result
    }

    /// Copy bytes `[start, start + count)` without consuming them.
    pub fn peek_range(&self, start: usize, count: usize) -> Vec<u8> {
        if start >= self.data.len() {
            return Vec::new();
        }
        let end = (start + count).min(self.data.len());
        self.data.range(start..end).copied().collect()
    }

    /// Position of the first occurrence of `pattern` at or after `from`.
    pub fn find_pattern(&self, from: usize, pattern: &[u8]) -> Option<usize> {
        if pattern.is_empty() || from + pattern.len() > self.data.len() {
            return None;
        }
        (from..=self.data.len() - pattern.len()).find(|&i| {
            pattern
                .iter()
                .enumerate()
                .all(|(j, &byte)| self.data[i + j] == byte)
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn stats(&self) -> IoBufferStats {
        IoBufferStats {
            current_len: self.data.len(),
            bytes_written: self.bytes_written,
            bytes_consumed: self.bytes_consumed,
            bytes_dropped: self.bytes_dropped,
        }
    }
}

/// Statistics about an IoBuffer instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoBufferStats {
    pub current_len: usize,
    pub bytes_written: u64,
    pub bytes_consumed: u64,
    pub bytes_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut buffer = IoBuffer::new(16);
        assert_eq!(buffer.write(&[1, 2, 3]), 0);
        assert_eq!(buffer.len(), 3);

        assert_eq!(buffer.consume(2), vec![1, 2]);
        assert_eq!(buffer.consume(10), vec![3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut buffer = IoBuffer::new(4);
        buffer.write(&[1, 2, 3]);
        assert_eq!(buffer.write(&[4, 5, 6]), 2);
        assert_eq!(buffer.peek_range(0, 4), vec![3, 4, 5, 6]);

        // A single oversized write keeps only its tail.
        assert_eq!(buffer.write(&[7, 8, 9, 10, 11, 12]), 6);
        assert_eq!(buffer.peek_range(0, 4), vec![9, 10, 11, 12]);
        assert_eq!(buffer.stats().bytes_dropped, 8);
    }

    #[test]
    fn test_pattern_finding() {
        let mut buffer = IoBuffer::new(16);
        buffer.write(&[1, 2, 3, 4, 2, 3, 5]);

        assert_eq!(buffer.find_pattern(0, &[2, 3]), Some(1));
        assert_eq!(buffer.find_pattern(2, &[2, 3]), Some(4));
        assert_eq!(buffer.find_pattern(0, &[9, 8]), None);
        assert_eq!(buffer.find_pattern(6, &[5, 5]), None);
    }

    #[test]
    fn test_statistics() {
        let mut buffer = IoBuffer::new(16);
        buffer.write(&[1, 2, 3, 4, 5]);
        buffer.consume(2);

        let stats = buffer.stats();
        assert_eq!(stats.current_len, 3);
        assert_eq!(stats.bytes_written, 5);
        assert_eq!(stats.bytes_consumed, 2);
    }
}
