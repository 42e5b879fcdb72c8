//! # Variable Data Records
//!
//! One step of the CI=0x72 record walk: DIF and its DIFE chain, VIF and its
//! VIFE chain, then the data field. Special DIFs that end the record list are
//! reported as [`RecordStep`] variants instead of records.

use crate::constants::{
    MBUS_DATA_RECORD_DIFE_MASK_DEVICE, MBUS_DATA_RECORD_DIFE_MASK_STORAGE_NO,
    MBUS_DATA_RECORD_DIFE_MASK_TARIFF, MBUS_DATA_RECORD_DIF_MASK_DATA, MBUS_DIB_DIF_END,
    MBUS_DIB_DIF_EXTENSION_BIT, MBUS_DIB_DIF_IDLE_FILLER, MBUS_DIB_DIF_MANUFACTURER_SPECIFIC,
    MBUS_DIB_DIF_MORE_RECORDS_FOLLOW, MBUS_DIB_VIF_EXTENSION_BIT,
};
use crate::error::MeterError;
use crate::util::ByteCursor;
use serde::Serialize;

/// How a DIF with length code 0 is treated in the middle of a record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroLengthData {
    /// No data bytes follow the VIF chain.
    #[default]
    Empty,
    /// One byte is consumed, for meters that pad such records.
    SingleByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderConfig {
    pub zero_length: ZeroLengthData,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DataInformationBlock {
    pub dif: u8,
    pub dife: Vec<u8>,
    pub storage_number: u32,
    pub tariff: u32,
    pub device_unit: u32,
}

impl DataInformationBlock {
    pub fn length_code(&self) -> u8 {
        self.dif & MBUS_DATA_RECORD_DIF_MASK_DATA
    }

    pub fn data_length(&self, zero_length: ZeroLengthData) -> usize {
        match (self.length_code(), zero_length) {
            (0, ZeroLengthData::SingleByte) => 1,
            (code, _) => mbus_dif_datalength_lookup(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValueInformationBlock {
    pub vif: u8,
    pub vife: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRecord {
    pub dib: DataInformationBlock,
    pub vib: ValueInformationBlock,
    pub data: Vec<u8>,
    /// Offset of the DIF within the user data.
    pub offset: usize,
}

/// Result of reading one DIF-introduced item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordStep {
    Record(DataRecord),
    /// End of user data (`0x00`) or idle filler (`0x2F`).
    End,
    /// DIF `0x0F`/`0x1F`: the rest of the telegram is manufacturer data.
    ManufacturerSpecific {
        more_records_follow: bool,
        data: Vec<u8>,
    },
}

/// Data field length for a DIF length code.
pub fn mbus_dif_datalength_lookup(code: u8) -> usize {
    match code & MBUS_DATA_RECORD_DIF_MASK_DATA {
        0x01 => 1,
        0x02 => 2,
        0x03 => 3,
        0x04 | 0x05 => 4,
        0x06 => 6,
        0x07 => 8,
        _ => 0,
    }
}

/// Read the next record starting at the cursor.
///
/// On error the cursor may have advanced into the broken record; callers use
/// the position they saved before the call to report where decoding stopped.
pub fn parse_record(
    cursor: &mut ByteCursor<'_>,
    config: &DecoderConfig,
) -> Result<RecordStep, MeterError> {
    let offset = cursor.position();
    let dif = cursor.read_byte()?;

    match dif {
        MBUS_DIB_DIF_END | MBUS_DIB_DIF_IDLE_FILLER => return Ok(RecordStep::End),
        MBUS_DIB_DIF_MANUFACTURER_SPECIFIC | MBUS_DIB_DIF_MORE_RECORDS_FOLLOW => {
            return Ok(RecordStep::ManufacturerSpecific {
                more_records_follow: dif == MBUS_DIB_DIF_MORE_RECORDS_FOLLOW,
                data: cursor.take_rest().to_vec(),
            });
        }
        _ => {}
    }

    let dib = parse_dib(dif, cursor);
    let vib = parse_vib(cursor)?;
    let data = cursor.read_bytes(dib.data_length(config.zero_length))?.to_vec();

    Ok(RecordStep::Record(DataRecord {
        dib,
        vib,
        data,
        offset,
    }))
}

fn parse_dib(dif: u8, cursor: &mut ByteCursor<'_>) -> DataInformationBlock {
    let mut dib = DataInformationBlock {
        dif,
        ..DataInformationBlock::default()
    };

    let mut extends = dif & MBUS_DIB_DIF_EXTENSION_BIT != 0;
    while extends {
        let Ok(dife) = cursor.read_byte() else {
            break;
        };
        let index = dib.dife.len() as u32;
        dib.storage_number |= u32::from(dife & MBUS_DATA_RECORD_DIFE_MASK_STORAGE_NO)
            .checked_shl(4 * index)
            .unwrap_or(0);
        dib.tariff |= u32::from((dife & MBUS_DATA_RECORD_DIFE_MASK_TARIFF) >> 4)
            .checked_shl(2 * index)
            .unwrap_or(0);
        if dife & MBUS_DATA_RECORD_DIFE_MASK_DEVICE != 0 {
            dib.device_unit += 1;
        }
        dib.dife.push(dife);
        extends = dife & MBUS_DIB_DIF_EXTENSION_BIT != 0;
    }
    dib
}

fn parse_vib(cursor: &mut ByteCursor<'_>) -> Result<ValueInformationBlock, MeterError> {
    let vif = cursor.read_byte()?;
    let mut vib = ValueInformationBlock {
        vif,
        vife: Vec::new(),
    };

    let mut last = vif;
    while last & MBUS_DIB_VIF_EXTENSION_BIT != 0 {
        let Ok(vife) = cursor.read_byte() else {
            break;
        };
        vib.vife.push(vife);
        last = vife;
    }
    Ok(vib)
}
