//! Secondary Addressing for M-Bus (EN 13757-3 selection by CI = 0x52)
//!
//! Several meters can share one bus (or one IR head can see a meter whose
//! primary address is unknown). Selecting by secondary address sends
//! `SND_UD` to address 0xFD with CI 0x52 and an 8-byte mask: 4 BCD bytes of
//! serial number (least significant digit pair first), 2 bytes manufacturer,
//! version and medium. Any nibble `F` is a wildcard.

use crate::constants::{
    MBUS_ADDRESS_NETWORK_LAYER, MBUS_CONTROL_INFO_SELECT_SLAVE, MBUS_CONTROL_MASK_SND_UD,
    MBUS_SELECT_WILDCARD,
};
use crate::error::MeterError;
use crate::mbus::frame::MBusFrame;
use std::fmt;

/// Selection mask for one meter. `None` fields are sent as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecondaryAddress {
    /// Up to 8 decimal digits; `None` selects any serial number.
    pub serial: Option<String>,
    pub manufacturer: Option<u16>,
    pub version: Option<u8>,
    pub medium: Option<u8>,
}

impl SecondaryAddress {
    /// Select by serial number only, everything else wildcarded.
    pub fn serial(serial: &str) -> Self {
        Self {
            serial: Some(serial.to_string()),
            ..Self::default()
        }
    }

    /// Matches whichever meter answers.
    pub fn wildcard() -> Self {
        Self::default()
    }

    /// The 8-byte selection mask carried after CI.
    pub fn to_bytes(&self) -> Result<[u8; 8], MeterError> {
        let mut bytes = [MBUS_SELECT_WILDCARD; 8];
        if let Some(serial) = &self.serial {
            bytes[..4].copy_from_slice(&encode_serial_bcd(serial)?);
        }
        if let Some(manufacturer) = self.manufacturer {
            bytes[4..6].copy_from_slice(&manufacturer.to_le_bytes());
        }
        if let Some(version) = self.version {
            bytes[6] = version;
        }
        if let Some(medium) = self.medium {
            bytes[7] = medium;
        }
        Ok(bytes)
    }
}

impl fmt::Display for SecondaryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.serial {
            Some(serial) => write!(f, "ID:{serial}")?,
            None => write!(f, "ID:*")?,
        }
        match self.manufacturer {
            Some(m) => write!(f, " MFG:{m:04X}")?,
            None => write!(f, " MFG:*")?,
        }
        Ok(())
    }
}

/// BCD-encode an identification number, least significant digit pair first.
///
/// Non-digit characters are ignored and the number is left-padded with
/// zeros to 8 digits, so `"5115-8148"` and `"51158148"` are equivalent.
pub fn encode_serial_bcd(serial: &str) -> Result<[u8; 4], MeterError> {
    let digits: Vec<u8> = serial
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as u8)
        .collect();
    if digits.is_empty() || digits.len() > 8 {
        return Err(MeterError::InvalidSerialNumber(serial.to_string()));
    }

    let mut padded = [0u8; 8];
    padded[8 - digits.len()..].copy_from_slice(&digits);

    let mut bytes = [0u8; 4];
    for (i, pair) in padded.chunks(2).rev().enumerate() {
        bytes[i] = (pair[0] << 4) | pair[1];
    }
    Ok(bytes)
}

/// Render BCD identification bytes (least significant pair first) as digits.
///
/// Non-decimal nibbles are kept as hex digits so wildcards show up as `F`.
pub fn decode_serial_bcd(bytes: &[u8]) -> String {
    bytes
        .iter()
        .rev()
        .map(|b| format!("{:X}{:X}", b >> 4, b & 0x0F))
        .collect()
}

/// Build the `SND_UD` selection frame for `address`.
pub fn build_secondary_selection_frame(address: &SecondaryAddress) -> Result<MBusFrame, MeterError> {
    Ok(MBusFrame::long(
        MBUS_CONTROL_MASK_SND_UD,
        MBUS_ADDRESS_NETWORK_LAYER,
        MBUS_CONTROL_INFO_SELECT_SLAVE,
        address.to_bytes()?.to_vec(),
    ))
}
