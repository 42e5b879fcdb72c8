//! # SML Reading Extraction
//!
//! Pulls the two energy registers and the active power out of a decoded
//! `GetListResponse`. The values sit at fixed positions in the tree rather
//! than being looked up by OBIS code, so [`ReadingLayout`] describes where
//! they are for a given meter model. The default layout matches an
//! eHZ-style meter: `root[1][3][1][4]` is the value list and element 5 of
//! entries 2, 3 and 4 holds tariff 1, tariff 2 and power.

use crate::constants::SML_ENERGY_DIVISOR;
use crate::error::MeterError;
use crate::sml::integer::decode_integer;
use crate::sml::tree::{decode_message, SmlNode};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SmlReadingSet {
    pub tariff1_kwh: f64,
    pub tariff2_kwh: f64,
    pub power_w: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingLayout {
    /// Path from the root to the list of value entries.
    pub value_list: Vec<usize>,
    pub tariff1_entry: usize,
    pub tariff2_entry: usize,
    pub power_entry: usize,
    /// Element of an entry holding the integer value.
    pub value_index: usize,
    /// Raw energy counts per kWh.
    pub energy_divisor: f64,
}

impl Default for ReadingLayout {
    fn default() -> Self {
        ReadingLayout {
            value_list: vec![1, 3, 1, 4],
            tariff1_entry: 2,
            tariff2_entry: 3,
            power_entry: 4,
            value_index: 5,
            energy_divisor: SML_ENERGY_DIVISOR,
        }
    }
}

impl ReadingLayout {
    fn value(&self, values: &SmlNode, entry: usize) -> Result<i64, MeterError> {
        decode_integer(values.at(&[entry, self.value_index])?)
    }
}

pub fn extract_readings(root: &SmlNode, layout: &ReadingLayout) -> Result<SmlReadingSet, MeterError> {
    let messages = root
        .as_list()
        .ok_or_else(|| MeterError::StructuralViolation("root is not a list".into()))?;
    if messages.len() < 2 {
        return Err(MeterError::StructuralViolation(format!(
            "expected at least 2 messages, found {}",
            messages.len()
        )));
    }

    let values = root.at(&layout.value_list)?;
    let tariff1 = layout.value(values, layout.tariff1_entry)?;
    let tariff2 = layout.value(values, layout.tariff2_entry)?;
    let power = layout.value(values, layout.power_entry)?;

    Ok(SmlReadingSet {
        tariff1_kwh: tariff1 as f64 / layout.energy_divisor,
        tariff2_kwh: tariff2 as f64 / layout.energy_divisor,
        power_w: power,
    })
}

/// Decode a message body and extract its readings in one step.
pub fn decode_readings(
    body: &[u8],
    max_depth: usize,
    layout: &ReadingLayout,
) -> Result<SmlReadingSet, MeterError> {
    let root = decode_message(body, max_depth)?;
    extract_readings(&root, layout)
}
