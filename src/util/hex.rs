//! # Hex Helpers
//!
//! Hex formatting for frame dumps and lenient hex parsing for captured
//! telegrams pasted into the CLI or tests.

use crate::error::MeterError;

/// Format bytes as "68 31 31 68" for log output.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a captured telegram, ignoring separators such as spaces, dashes
/// (C# `BitConverter` dumps) or colons.
pub fn parse_hex_lenient(input: &str) -> Result<Vec<u8>, MeterError> {
    let cleaned: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    if cleaned.is_empty() || cleaned.len() % 2 != 0 {
        return Err(MeterError::InvalidHexString);
    }

    hex::decode(&cleaned).map_err(|_| MeterError::InvalidHexString)
}
