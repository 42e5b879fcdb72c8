//! # SML Serial Reader
//!
//! Pulls bytes from an [`AsyncRead`] source (normally the optical head at
//! 9600 8N1), feeds them through an [`SmlStream`] and yields one reading set
//! per complete message. A malformed message yields an error for that
//! message only; the next call carries on with the following one.

use crate::error::MeterError;
use crate::sml::reading::{decode_readings, ReadingLayout, SmlReadingSet};
use crate::sml::stream::{SmlStream, DEFAULT_STREAM_CAPACITY};
use crate::sml::tree::DEFAULT_MAX_DEPTH;
use crate::util::logging::{FrameTrace, LogThrottle};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_serial::SerialPortBuilderExt;

const TRACE_TARGET: &str = "metering_rs::sml";

#[derive(Debug, Clone)]
pub struct SmlConfig {
    /// Upper bound of buffered, not yet framed bytes.
    pub capacity: usize,
    pub max_depth: usize,
    pub baudrate: u32,
    /// Bytes requested per read.
    pub read_chunk: usize,
    pub trace_frames: bool,
}

impl Default for SmlConfig {
    fn default() -> Self {
        SmlConfig {
            capacity: DEFAULT_STREAM_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            baudrate: 9600,
            read_chunk: 256,
            trace_frames: false,
        }
    }
}

pub struct SmlReader<R> {
    source: R,
    stream: SmlStream,
    layout: ReadingLayout,
    max_depth: usize,
    read_chunk: usize,
    chunk: BytesMut,
    trace: FrameTrace,
    throttle: LogThrottle,
}

impl SmlReader<tokio_serial::SerialStream> {
    /// Open `port_name` with 8N1 framing.
    pub async fn open(port_name: &str, config: &SmlConfig) -> Result<Self, MeterError> {
        let port = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .open_native_async()?;
        log::info!("Listening for SML on {port_name} at {} baud", config.baudrate);
        Ok(Self::new(port, config))
    }
}

impl<R: AsyncRead + Unpin> SmlReader<R> {
    pub fn new(source: R, config: &SmlConfig) -> Self {
        SmlReader {
            source,
            stream: SmlStream::new(config.capacity),
            layout: ReadingLayout::default(),
            max_depth: config.max_depth,
            read_chunk: config.read_chunk.max(1),
            chunk: BytesMut::with_capacity(config.read_chunk),
            trace: FrameTrace::new(TRACE_TARGET, config.trace_frames),
            throttle: LogThrottle::new(60_000, 5),
        }
    }

    /// Use a different value layout, for meters that order their list differently.
    pub fn with_layout(mut self, layout: ReadingLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn stream(&self) -> &SmlStream {
        &self.stream
    }

    /// Wait for the next complete message and decode it.
    ///
    /// Returns `None` once the source reaches end of file.
    pub async fn next_reading(&mut self) -> Option<Result<SmlReadingSet, MeterError>> {
        loop {
            if let Some(message) = self.stream.extract_message() {
                return Some(self.decode(&message));
            }

            self.chunk.clear();
            self.chunk.reserve(self.read_chunk);
            match self.source.read_buf(&mut self.chunk).await {
                Ok(0) => return None,
                Ok(_) => {
                    self.trace.frame("RX", &self.chunk);
                    self.stream.push(&self.chunk);
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    fn decode(&mut self, message: &[u8]) -> Result<SmlReadingSet, MeterError> {
        self.trace.frame("SML message", message);
        let result = decode_readings(message, self.max_depth, &self.layout);
        if let Err(e) = &result {
            if self.throttle.allow() {
                log::warn!("Discarding SML message of {} bytes: {e}", message.len());
            }
        }
        result
    }
}
