//! # ByteCursor - Bounds-Checked Frame View
//!
//! A read position over a borrowed byte slice, shared by the M-Bus record
//! decoder and the SML tree decoder. Every read past the end yields
//! `MeterError::OutOfData` and leaves the position unchanged, so callers can
//! treat it as "frame incomplete/corrupt" instead of panicking.
//!
//! ```rust
//! use metering_rs::util::ByteCursor;
//!
//! let mut cursor = ByteCursor::new(&[0x04, 0x06, 0xE8]);
//! assert_eq!(cursor.read_byte().unwrap(), 0x04);
//! assert_eq!(cursor.peek(0).unwrap(), 0x06);
//! assert!(cursor.read_bytes(3).is_err());
//! assert_eq!(cursor.remaining(), 2);
//! ```

use crate::error::MeterError;

#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading at `pos`; positions past the end are clamped.
    pub fn with_position(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos: pos.min(data.len()),
        }
    }

    /// Look at the byte `offset` positions ahead without consuming it.
    pub fn peek(&self, offset: usize) -> Result<u8, MeterError> {
        self.pos
            .checked_add(offset)
            .and_then(|i| self.data.get(i))
            .copied()
            .ok_or(MeterError::OutOfData {
                needed: offset.saturating_add(1),
                available: self.remaining(),
            })
    }

    pub fn read_byte(&mut self) -> Result<u8, MeterError> {
        let byte = self.peek(0)?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], MeterError> {
        if n > self.remaining() {
            return Err(MeterError::OutOfData {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Consume everything not yet read.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = self.rest();
        self.pos = self.data.len();
        rest
    }
}
