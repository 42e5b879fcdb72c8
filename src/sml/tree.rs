//! # SML Tree Decoding
//!
//! SML encodes values as type-length-value nodes. The first TL byte carries
//! the type in bits 6..4 and four length bits in the low nibble; bit 7 means
//! another TL byte with four more length bits follows. Lists (`0x7_`) count
//! children. For every other type the length includes the TL bytes
//! themselves, and a lone `0x00` marks the end of a message. A declared
//! length of 0 counts as 1 for lists and scalars alike.
//!
//! Decoding is a depth-bounded recursive descent producing [`SmlNode`]s.

use crate::constants::{SML_TL_MORE_BIT, SML_TYPE_LIST};
use crate::error::MeterError;
use crate::util::ByteCursor;

pub const DEFAULT_MAX_DEPTH: usize = 16;

/// A TL chain longer than this cannot describe a sane length.
const MAX_TL_BYTES: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmlNode {
    Scalar {
        /// First TL byte, e.g. `0x65` for a 32-bit unsigned value.
        type_length: u8,
        value: Vec<u8>,
    },
    List(Vec<SmlNode>),
}

impl SmlNode {
    pub fn as_list(&self) -> Option<&[SmlNode]> {
        match self {
            SmlNode::List(children) => Some(children),
            SmlNode::Scalar { .. } => None,
        }
    }

    /// Walk child indices from this node.
    ///
    /// Fails with a structural error naming the step that could not be taken.
    pub fn at(&self, path: &[usize]) -> Result<&SmlNode, MeterError> {
        let mut node = self;
        for (depth, &index) in path.iter().enumerate() {
            let children = node.as_list().ok_or_else(|| {
                MeterError::StructuralViolation(format!(
                    "expected a list at {:?}",
                    &path[..depth]
                ))
            })?;
            node = children.get(index).ok_or_else(|| {
                MeterError::StructuralViolation(format!(
                    "no element {index} at {:?} (list has {})",
                    &path[..depth],
                    children.len()
                ))
            })?;
        }
        Ok(node)
    }
}

/// Decode a message body into a root list of its top-level nodes.
pub fn decode_message(body: &[u8], max_depth: usize) -> Result<SmlNode, MeterError> {
    let mut cursor = ByteCursor::new(body);
    let mut nodes = Vec::new();
    while !cursor.is_empty() {
        nodes.push(decode_node(&mut cursor, 0, max_depth).map_err(truncation)?);
    }
    Ok(SmlNode::List(nodes))
}

fn truncation(err: MeterError) -> MeterError {
    match err {
        MeterError::OutOfData { needed, available } => MeterError::StructuralViolation(format!(
            "message ends early: needed {needed} bytes, {available} left"
        )),
        other => other,
    }
}

fn decode_node(
    cursor: &mut ByteCursor<'_>,
    depth: usize,
    max_depth: usize,
) -> Result<SmlNode, MeterError> {
    let type_length = cursor.read_byte()?;
    let kind = (type_length >> 4) & 0x07;
    let mut length = usize::from(type_length & 0x0F);
    let mut tl_bytes = 1;

    let mut more = type_length & SML_TL_MORE_BIT != 0;
    while more {
        if tl_bytes == MAX_TL_BYTES {
            return Err(MeterError::StructuralViolation(format!(
                "TL chain longer than {MAX_TL_BYTES} bytes"
            )));
        }
        let next = cursor.read_byte()?;
        length = (length << 4) | usize::from(next & 0x0F);
        tl_bytes += 1;
        more = next & SML_TL_MORE_BIT != 0;
    }

    let length = length.max(1);
    if kind == SML_TYPE_LIST {
        if depth >= max_depth {
            return Err(MeterError::StructuralViolation(format!(
                "lists nested deeper than {max_depth}"
            )));
        }
        let children = (0..length)
            .map(|_| decode_node(cursor, depth + 1, max_depth))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(SmlNode::List(children));
    }

    let value_len = length.checked_sub(tl_bytes).ok_or_else(|| {
        MeterError::StructuralViolation(format!(
            "length {length} shorter than its {tl_bytes} TL bytes"
        ))
    })?;
    let value = cursor.read_bytes(value_len)?.to_vec();
    Ok(SmlNode::Scalar { type_length, value })
}
