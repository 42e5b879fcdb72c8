//! # Metering Error Handling
//!
//! This module defines the MeterError enum, which represents the different error
//! types that can occur while talking to a meter or decoding its telegrams.

use thiserror::Error;

/// Represents the different error types that can occur in the metering crate.
#[derive(Debug, Error)]
pub enum MeterError {
    /// Indicates an error related to the serial port communication.
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// Expected bytes did not arrive within the bound for this stage.
    #[error("Timeout while waiting for {stage}")]
    Timeout { stage: &'static str },

    /// Structural frame fields (start/stop bytes, length doubling) do not match.
    #[error("Frame format violation: {0}")]
    FormatViolation(String),

    /// Indicates a checksum mismatch.
    #[error("Invalid checksum: expected {expected}, calculated {calculated}")]
    InvalidChecksum { expected: u8, calculated: u8 },

    /// A read went past the end of the buffer.
    #[error("Out of data: needed {needed} bytes, {available} available")]
    OutOfData { needed: usize, available: usize },

    /// Declared element or byte counts exceed the available data.
    #[error("Structural violation: {0}")]
    StructuralViolation(String),

    /// An SML integer tag outside the signed/unsigned width table.
    #[error("Unsupported integer encoding: 0x{0:02X}")]
    EncodingViolation(u8),

    /// The CI field selects an application layer this crate does not decode.
    #[error("Unsupported CI field: 0x{0:02X}")]
    UnsupportedControlInformation(u8),

    /// A secondary address serial number that cannot be BCD encoded.
    #[error("Invalid serial number: {0}")]
    InvalidSerialNumber(String),

    /// Indicates an invalid hexadecimal string was provided.
    #[error("Invalid hexadecimal string")]
    InvalidHexString,

    /// A catch‑all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}

/// Coarse failure classes, so callers can tell "meter silent" from
/// "meter sent garbage" without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Io,
    Timeout,
    FormatViolation,
    StructuralViolation,
    EncodingViolation,
    Usage,
}

impl MeterError {
    pub fn kind(&self) -> FailureKind {
        match self {
            MeterError::SerialPortError(_) => FailureKind::Io,
            MeterError::Timeout { .. } => FailureKind::Timeout,
            MeterError::FormatViolation(_)
            | MeterError::InvalidChecksum { .. }
            | MeterError::UnsupportedControlInformation(_) => FailureKind::FormatViolation,
            MeterError::OutOfData { .. } | MeterError::StructuralViolation(_) => {
                FailureKind::StructuralViolation
            }
            MeterError::EncodingViolation(_) => FailureKind::EncodingViolation,
            MeterError::InvalidSerialNumber(_)
            | MeterError::InvalidHexString
            | MeterError::Other(_) => FailureKind::Usage,
        }
    }

    /// Whether repeating the whole request/response exchange may help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Timeout | FailureKind::FormatViolation
        )
    }
}

impl From<std::io::Error> for MeterError {
    fn from(e: std::io::Error) -> Self {
        MeterError::SerialPortError(e.to_string())
    }
}

impl From<tokio_serial::Error> for MeterError {
    fn from(e: tokio_serial::Error) -> Self {
        MeterError::SerialPortError(e.to_string())
    }
}
