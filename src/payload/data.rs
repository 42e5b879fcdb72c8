//! # Variable Data Response Decoding (CI = 0x72)
//!
//! Turns the user data of a `RSP_UD` long frame into an [`MBusResponse`]:
//! the fixed 12-byte header plus the readings and instant values found in the
//! record list. Decoding is best effort. A record that runs past the end of
//! the telegram stops the walk, and everything decoded up to that point is
//! returned with [`MBusResponse::truncated_at`] set.
//!
//! ```rust
//! use metering_rs::payload::data::decode_variable_data;
//!
//! let user_data = [
//!     0x08, 0x01, 0x72, // C, A, CI
//!     0x48, 0x81, 0x15, 0x51, 0x2D, 0x2C, 0x01, 0x04, 0x00, 0x00, 0x00, 0x00,
//!     0x04, 0x06, 0xE8, 0x03, 0x00, 0x00, // Energie
//! ];
//! let response = decode_variable_data(&user_data).unwrap();
//! assert_eq!(response.header.identification, "51158148");
//! assert_eq!(response.readings[0].formatted_value, "1.000 MWh");
//! ```

use crate::constants::{
    MBUS_CONTROL_INFO_RESP_VARIABLE, MBUS_FIRST_RECORD_OFFSET, MBUS_USER_DATA_PREFIX_LENGTH,
    MBUS_VARIABLE_HEADER_LENGTH, MBUS_VIF_FABRICATION_NO,
};
use crate::error::MeterError;
use crate::mbus::secondary_addressing::decode_serial_bcd;
use crate::payload::data_encoding::{
    decode_int_le, decode_uint_le, format_fixed_point, manufacturer_id_to_string,
};
use crate::payload::record::{parse_record, DataRecord, DecoderConfig, RecordStep};
use crate::payload::vif_maps::{Quantity, QuantityKind, QuantityTable};
use crate::util::ByteCursor;
use serde::Serialize;

/// Fixed header of a variable data response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MBusHeader {
    /// Identification number as printed on the meter.
    pub identification: String,
    pub manufacturer: u16,
    pub version: u8,
    pub medium: u8,
    pub access_number: u8,
    pub status: u8,
    pub signature: u16,
}

impl MBusHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, MeterError> {
        let mut cursor = ByteCursor::new(bytes);
        let identification = decode_serial_bcd(cursor.read_bytes(4)?);
        let manufacturer = u16::from_le_bytes([cursor.read_byte()?, cursor.read_byte()?]);
        let version = cursor.read_byte()?;
        let medium = cursor.read_byte()?;
        let access_number = cursor.read_byte()?;
        let status = cursor.read_byte()?;
        let signature = u16::from_le_bytes([cursor.read_byte()?, cursor.read_byte()?]);

        Ok(MBusHeader {
            identification,
            manufacturer,
            version,
            medium,
            access_number,
            status,
            signature,
        })
    }

    /// Three-letter manufacturer code, e.g. `KAM`.
    pub fn manufacturer_code(&self) -> String {
        manufacturer_id_to_string(self.manufacturer)
    }

    pub fn medium_name(&self) -> &'static str {
        medium_name(self.medium)
    }

    /// Numeric identification, `None` if it contains non-BCD nibbles.
    pub fn id_number(&self) -> Option<u64> {
        self.identification.parse().ok()
    }
}

pub fn medium_name(medium: u8) -> &'static str {
    match medium {
        0x02 => "Electricity",
        0x03 => "Gas",
        0x04 => "Heat",
        0x06 => "Hot water",
        0x07 => "Water",
        0x08 => "Heat cost allocator",
        0x0A => "Cooling (outlet)",
        0x0B => "Cooling (inlet)",
        0x0C => "Heat (inlet)",
        0x0D => "Heat/Cooling combined",
        _ => "Unknown",
    }
}

/// A cumulative register value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub storage_number: u32,
    pub tariff: u32,
    pub label: String,
    pub formatted_value: String,
    pub value: f64,
    pub unit: String,
}

/// A momentary value such as power, flow or a temperature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstantReading {
    pub label: String,
    pub formatted_value: String,
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MBusResponse {
    pub control: u8,
    pub address: u8,
    pub control_information: u8,
    pub header: MBusHeader,
    pub readings: Vec<Reading>,
    pub instants: Vec<InstantReading>,
    /// Fabrication number from a VIF 0x78 record.
    pub secondary_id: Option<String>,
    pub manufacturer_data: Vec<u8>,
    pub more_records_follow: bool,
    /// Offset (within the user data) of a record that ran out of data.
    pub truncated_at: Option<usize>,
}

/// Record decoder bound to a quantity table and decoding options.
#[derive(Debug, Clone, Default)]
pub struct VariableDataDecoder {
    table: QuantityTable,
    config: DecoderConfig,
}

impl VariableDataDecoder {
    pub fn new(table: QuantityTable, config: DecoderConfig) -> Self {
        Self { table, config }
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn table_mut(&mut self) -> &mut QuantityTable {
        &mut self.table
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode the user data (C, A, CI, header, records) of a long frame.
    pub fn decode(&self, user_data: &[u8]) -> Result<MBusResponse, MeterError> {
        if user_data.len() < MBUS_FIRST_RECORD_OFFSET {
            return Err(MeterError::StructuralViolation(format!(
                "user data of {} bytes is shorter than the {MBUS_FIRST_RECORD_OFFSET}-byte header",
                user_data.len()
            )));
        }
        let control_information = user_data[2];
        if control_information != MBUS_CONTROL_INFO_RESP_VARIABLE {
            return Err(MeterError::UnsupportedControlInformation(control_information));
        }

        let header = MBusHeader::parse(
            &user_data[MBUS_USER_DATA_PREFIX_LENGTH
                ..MBUS_USER_DATA_PREFIX_LENGTH + MBUS_VARIABLE_HEADER_LENGTH],
        )?;
        let mut response = MBusResponse {
            control: user_data[0],
            address: user_data[1],
            control_information,
            header,
            readings: Vec::new(),
            instants: Vec::new(),
            secondary_id: None,
            manufacturer_data: Vec::new(),
            more_records_follow: false,
            truncated_at: None,
        };

        let mut cursor = ByteCursor::with_position(user_data, MBUS_FIRST_RECORD_OFFSET);
        while !cursor.is_empty() {
            let offset = cursor.position();
            match parse_record(&mut cursor, &self.config) {
                Ok(RecordStep::Record(record)) => self.apply(record, &mut response),
                Ok(RecordStep::End) => break,
                Ok(RecordStep::ManufacturerSpecific {
                    more_records_follow,
                    data,
                }) => {
                    response.more_records_follow = more_records_follow;
                    response.manufacturer_data = data;
                    break;
                }
                Err(e) => {
                    log::warn!("Record at offset {offset} is incomplete: {e}");
                    response.truncated_at = Some(offset);
                    break;
                }
            }
        }

        Ok(response)
    }

    fn apply(&self, record: DataRecord, response: &mut MBusResponse) {
        let vif = record.vib.vif;
        let len = record.data.len();

        if vif == MBUS_VIF_FABRICATION_NO && len == 4 {
            response.secondary_id = Some(decode_serial_bcd(&record.data));
            return;
        }

        let Some(quantity) = self.table.lookup(vif, len) else {
            log::debug!(
                "Skipping record at offset {}: VIF 0x{vif:02X}, {len} bytes",
                record.offset
            );
            return;
        };

        let raw = if quantity.signed {
            decode_int_le(&record.data)
        } else {
            match i64::try_from(decode_uint_le(&record.data)) {
                Ok(raw) => raw,
                Err(_) => {
                    log::warn!(
                        "Skipping record at offset {}: {} exceeds the value range",
                        record.offset,
                        quantity.label
                    );
                    return;
                }
            }
        };
        let (formatted_value, value) = scaled(quantity, raw);
        match quantity.kind {
            QuantityKind::Cumulative => response.readings.push(Reading {
                storage_number: record.dib.storage_number,
                tariff: record.dib.tariff,
                label: quantity.label.clone(),
                formatted_value,
                value,
                unit: quantity.unit.clone(),
            }),
            QuantityKind::Instant => response.instants.push(InstantReading {
                label: quantity.label.clone(),
                formatted_value,
                value,
                unit: quantity.unit.clone(),
            }),
        }
    }
}

fn scaled(quantity: &Quantity, raw: i64) -> (String, f64) {
    let formatted = format!(
        "{} {}",
        format_fixed_point(raw, quantity.decimals),
        quantity.unit
    );
    let value = raw as f64 / 10f64.powi(quantity.decimals as i32);
    (formatted, value)
}

/// Decode with the standard quantity table and default options.
pub fn decode_variable_data(user_data: &[u8]) -> Result<MBusResponse, MeterError> {
    VariableDataDecoder::default().decode(user_data)
}
