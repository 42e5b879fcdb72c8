//! # metering-rs - Reading Heat and Electricity Meters over Serial Lines
//!
//! The metering-rs crate talks to utility meters through optical or wired
//! serial interfaces and decodes what they send:
//!
//! - M-Bus (EN 13757) request/response: wake-up preamble, `SND_NKE`,
//!   selection by secondary address, `REQ_UD2`, and decoding of the CI=0x72
//!   variable data response into readings and instant values
//! - SML (Smart Message Language) push telegrams from electricity meters:
//!   framing out of the byte stream, tree decoding and extraction of the
//!   tariff registers and active power
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! metering-rs = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use metering_rs::{connect, SecondaryAddress, VariableDataDecoder};
//!
//! # async fn run() -> Result<(), metering_rs::MeterError> {
//! let mut transport = connect("/dev/ttyUSB0").await?;
//! transport.probe(&SecondaryAddress::serial("51158148")).await?;
//! let response = transport.read_meter(0xFD, &VariableDataDecoder::default()).await?;
//! for reading in &response.readings {
//!     println!("{}: {}", reading.label, reading.formatted_value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod logging;
pub mod mbus;
pub mod payload;
pub mod sml;
pub mod util;

pub use crate::error::{FailureKind, MeterError};
pub use crate::logging::{init_logger, log_debug, log_error, log_info, log_warn};

// M-Bus link layer
pub use mbus::{
    Framing, MBusFrame, MBusFrameType, MBusTransport, SecondaryAddress, SerialConfig, SerialPort,
};

// M-Bus application layer
pub use payload::{
    DecoderConfig, InstantReading, MBusHeader, MBusResponse, Quantity, QuantityKind,
    QuantityTable, Reading, VariableDataDecoder, ZeroLengthData,
};

// SML
pub use sml::{ReadingLayout, SmlConfig, SmlNode, SmlReader, SmlReadingSet, SmlStream};

/// Open an M-Bus line with the default configuration (2400 baud, 8E1).
///
/// # Arguments
/// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
pub async fn connect(port: &str) -> Result<MBusTransport<tokio_serial::SerialStream>, MeterError> {
    MBusTransport::open(port, SerialConfig::default()).await
}

/// Decode a captured M-Bus long frame (envelope included).
///
/// # Returns
/// * `Ok(MBusResponse)` - Header and records of a CI=0x72 response
/// * `Err(MeterError)` - Envelope, checksum or header is invalid
pub fn decode_mbus_frame(
    frame: &[u8],
    decoder: &VariableDataDecoder,
) -> Result<MBusResponse, MeterError> {
    let user_data = mbus::frame::decode_long_frame(frame)?;
    decoder.decode(user_data)
}

/// Decode every complete SML message in a captured byte stream.
///
/// Each message yields its own result, so one corrupted telegram does not
/// hide the others.
pub fn decode_sml_capture(
    data: &[u8],
    config: &SmlConfig,
    layout: &ReadingLayout,
) -> Vec<Result<SmlReadingSet, MeterError>> {
    let mut stream = SmlStream::new(config.capacity.max(data.len()));
    stream.push(data);
    std::iter::from_fn(|| stream.extract_message())
        .map(|message| sml::decode_readings(&message, config.max_depth, layout))
        .collect()
}
