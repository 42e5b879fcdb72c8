//! Protocol Constants
//!
//! This module defines constants used by the M-Bus (EN 13757) and SML
//! decoders.

// ----------------------------------------------------------------------------
// M-Bus frame envelope
// ----------------------------------------------------------------------------

pub const MBUS_FRAME_ACK: u8 = 0xE5;
pub const MBUS_FRAME_SHORT_START: u8 = 0x10;
pub const MBUS_FRAME_LONG_START: u8 = 0x68;
pub const MBUS_FRAME_STOP: u8 = 0x16;

/// Short frame length: start, C, A, checksum, stop
pub const MBUS_FRAME_SHORT_LENGTH: usize = 5;

/// Long frame overhead around the user data: 0x68 L L 0x68 ... CS 0x16
pub const MBUS_FRAME_LONG_OVERHEAD: usize = 6;

/// Wake-up preamble byte, sent with 8N1 framing
pub const MBUS_WAKEUP_BYTE: u8 = 0x55;

/// Preamble length demanded by the IR head meters (WingStar/Ultramess)
pub const MBUS_WAKEUP_DEFAULT_LENGTH: usize = 504;

// ----------------------------------------------------------------------------
// Control / address / CI
// ----------------------------------------------------------------------------

/// Network layer (secondary addressing) address
pub const MBUS_ADDRESS_NETWORK_LAYER: u8 = 0xFD;

/// Broadcast address, all slaves reply
pub const MBUS_ADDRESS_BROADCAST_REPLY: u8 = 0xFE;

pub const MBUS_CONTROL_MASK_SND_NKE: u8 = 0x40;
pub const MBUS_CONTROL_MASK_SND_UD: u8 = 0x53;
pub const MBUS_CONTROL_MASK_REQ_UD2: u8 = 0x5B;

pub const MBUS_CONTROL_INFO_SELECT_SLAVE: u8 = 0x52;
pub const MBUS_CONTROL_INFO_RESP_VARIABLE: u8 = 0x72;

/// Wildcard nibble pair used in secondary selection
pub const MBUS_SELECT_WILDCARD: u8 = 0xFF;

// ----------------------------------------------------------------------------
// Variable data structure (CI = 0x72)
// ----------------------------------------------------------------------------

/// C, A and CI precede the fixed header
pub const MBUS_USER_DATA_PREFIX_LENGTH: usize = 3;

/// Fixed header: ID(4) manufacturer(2) version medium access status signature(2)
pub const MBUS_VARIABLE_HEADER_LENGTH: usize = 12;

/// Offset of the first data record inside the user data
pub const MBUS_FIRST_RECORD_OFFSET: usize =
    MBUS_USER_DATA_PREFIX_LENGTH + MBUS_VARIABLE_HEADER_LENGTH;

/// DIF (Data Information Field) mask for data length
pub const MBUS_DATA_RECORD_DIF_MASK_DATA: u8 = 0x0F;

/// DIFE mask for storage number
pub const MBUS_DATA_RECORD_DIFE_MASK_STORAGE_NO: u8 = 0x0F;

/// DIFE mask for tariff
pub const MBUS_DATA_RECORD_DIFE_MASK_TARIFF: u8 = 0x30;

/// DIFE mask for device
pub const MBUS_DATA_RECORD_DIFE_MASK_DEVICE: u8 = 0x40;

/// DIF end of user data
pub const MBUS_DIB_DIF_END: u8 = 0x00;

/// DIF idle filler
pub const MBUS_DIB_DIF_IDLE_FILLER: u8 = 0x2F;

/// DIF manufacturer specific
pub const MBUS_DIB_DIF_MANUFACTURER_SPECIFIC: u8 = 0x0F;

/// DIF more records follow
pub const MBUS_DIB_DIF_MORE_RECORDS_FOLLOW: u8 = 0x1F;

/// DIF extension bit
pub const MBUS_DIB_DIF_EXTENSION_BIT: u8 = 0x80;

/// VIF extension bit
pub const MBUS_DIB_VIF_EXTENSION_BIT: u8 = 0x80;

/// VIF: fabrication number
pub const MBUS_VIF_FABRICATION_NO: u8 = 0x78;

// ----------------------------------------------------------------------------
// SML
// ----------------------------------------------------------------------------

pub const SML_START_SEQUENCE: [u8; 8] = [0x1B, 0x1B, 0x1B, 0x1B, 0x01, 0x01, 0x01, 0x01];

pub const SML_END_SEQUENCE_PREFIX: [u8; 5] = [0x1B, 0x1B, 0x1B, 0x1B, 0x1A];

/// Fill count and two CRC bytes after the end prefix
pub const SML_END_TRAILER_LENGTH: usize = 3;

pub const SML_TL_MORE_BIT: u8 = 0x80;
pub const SML_TYPE_LIST: u8 = 0x07;
pub const SML_TYPE_SIGNED: u8 = 0x05;
pub const SML_TYPE_UNSIGNED: u8 = 0x06;

/// Energy registers are reported in 0.1 Wh
pub const SML_ENERGY_DIVISOR: f64 = 10_000.0;
