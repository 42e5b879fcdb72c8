//! The payload module contains the components responsible for decoding the
//! application layer of M-Bus variable data responses.

pub mod data;
pub mod data_encoding;
pub mod record;
pub mod vif_maps;

pub use data::{
    decode_variable_data, InstantReading, MBusHeader, MBusResponse, Reading, VariableDataDecoder,
};
pub use record::{DataRecord, DecoderConfig, RecordStep, ZeroLengthData};
pub use vif_maps::{Quantity, QuantityKind, QuantityTable};
