//! The sml module decodes Smart Message Language telegrams pushed by
//! electricity meters on their optical interface: framing out of a byte
//! stream, tree decoding and extraction of the energy and power readings.

pub mod integer;
pub mod reader;
pub mod reading;
pub mod stream;
pub mod tree;

pub use integer::decode_integer;
pub use reader::{SmlConfig, SmlReader};
pub use reading::{decode_readings, extract_readings, ReadingLayout, SmlReadingSet};
pub use stream::SmlStream;
pub use tree::{decode_message, SmlNode};
