//! The mbus module contains the components responsible for the M-Bus link
//! layer: frame packing and parsing, secondary address selection and the
//! serial request/response exchange.

pub mod frame;
pub mod secondary_addressing;
pub mod serial;
pub mod serial_mock;

pub use frame::{
    decode_frame, decode_long_frame, pack_frame, pack_long_frame, pack_short_frame, parse_frame,
    MBusFrame, MBusFrameType,
};
pub use secondary_addressing::{build_secondary_selection_frame, SecondaryAddress};
pub use serial::{Framing, MBusTransport, SerialConfig, SerialPort};
