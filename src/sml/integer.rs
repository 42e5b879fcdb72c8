//! SML integer leaves.
//!
//! The TL byte selects signedness (`0x5_` signed, `0x6_` unsigned) and width:
//! length 2 is 8 bit, 3 and 4 are 16 bit, 5 and 6 are 32 bit. Values are
//! big-endian; when a meter sends more value bytes than the width, the
//! low-order bytes are used.

use crate::constants::{SML_TYPE_SIGNED, SML_TYPE_UNSIGNED};
use crate::error::MeterError;
use crate::sml::tree::SmlNode;

fn width(type_length: u8) -> Option<usize> {
    match type_length & 0x0F {
        2 => Some(1),
        3 | 4 => Some(2),
        5 | 6 => Some(4),
        _ => None,
    }
}

pub fn decode_integer(node: &SmlNode) -> Result<i64, MeterError> {
    let SmlNode::Scalar { type_length, value } = node else {
        return Err(MeterError::StructuralViolation(
            "expected an integer, found a list".into(),
        ));
    };
    let tag = *type_length;
    let signed = match (tag >> 4) & 0x07 {
        SML_TYPE_SIGNED => true,
        SML_TYPE_UNSIGNED => false,
        _ => return Err(MeterError::EncodingViolation(tag)),
    };
    let width = width(tag).ok_or(MeterError::EncodingViolation(tag))?;
    if value.is_empty() {
        return Err(MeterError::EncodingViolation(tag));
    }

    let low_order = &value[value.len().saturating_sub(width)..];
    let raw = low_order
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

    if signed {
        let shift = 64 - 8 * low_order.len() as u32;
        Ok(((raw << shift) as i64) >> shift)
    } else {
        Ok(raw as i64)
    }
}
