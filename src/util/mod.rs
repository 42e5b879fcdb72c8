//! # Utility Modules
//!
//! Byte cursors, bounded stream buffers, hex helpers and frame logging used
//! by both the M-Bus and the SML decoders.

pub mod cursor;
pub mod hex;
pub mod iobuffer;
pub mod logging;

pub use cursor::ByteCursor;
pub use hex::{format_hex_compact, parse_hex_lenient};
pub use iobuffer::{IoBuffer, IoBufferStats};
pub use logging::{log_frame_hex, FrameTrace, LogThrottle};
