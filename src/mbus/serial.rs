//! # M-Bus Serial Communication
//!
//! Request/response exchanges with a meter over an optical or wired M-Bus
//! interface. Every transmission is preceded by a wake-up preamble of `0x55`
//! bytes sent with 8N1 framing, after which the line returns to the regular
//! 8E1 framing. Reception uses staged deadlines measured from the start of
//! the read: one for the first `0x68`, one for the length header and one for
//! the complete frame.
//!
//! The transport is generic over [`SerialPort`], so the same exchange code
//! runs against `tokio_serial` and against
//! [`MockSerialPort`](crate::mbus::serial_mock::MockSerialPort).

use crate::constants::{
    MBUS_ADDRESS_BROADCAST_REPLY, MBUS_CONTROL_MASK_REQ_UD2, MBUS_CONTROL_MASK_SND_NKE,
    MBUS_FRAME_ACK, MBUS_FRAME_LONG_OVERHEAD, MBUS_FRAME_LONG_START, MBUS_WAKEUP_BYTE,
    MBUS_WAKEUP_DEFAULT_LENGTH,
};
use crate::error::{FailureKind, MeterError};
use crate::mbus::frame::{decode_long_frame, pack_frame, pack_short_frame};
use crate::mbus::secondary_addressing::{build_secondary_selection_frame, SecondaryAddress};
use crate::payload::data::{MBusResponse, VariableDataDecoder};
use crate::util::logging::FrameTrace;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep, timeout_at, Instant};
use tokio_serial::SerialPortBuilderExt;

const TRACE_TARGET: &str = "metering_rs::mbus";

/// Character framing of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// 8N1, used only for the wake-up preamble.
    WakeUp,
    /// 8E1, used for every M-Bus frame.
    Operational,
}

impl Framing {
    pub fn parity(self) -> tokio_serial::Parity {
        match self {
            Framing::WakeUp => tokio_serial::Parity::None,
            Framing::Operational => tokio_serial::Parity::Even,
        }
    }
}

/// Byte stream with the line controls the M-Bus exchange needs.
#[async_trait]
pub trait SerialPort: AsyncRead + AsyncWrite + Unpin + Send {
    async fn set_framing(&mut self, framing: Framing) -> Result<(), MeterError>;

    /// Drop whatever the driver has buffered on the receive side.
    async fn discard_input(&mut self) -> Result<(), MeterError>;
}

#[async_trait]
impl SerialPort for tokio_serial::SerialStream {
    async fn set_framing(&mut self, framing: Framing) -> Result<(), MeterError> {
        tokio_serial::SerialPort::set_parity(self, framing.parity())?;
        Ok(())
    }

    async fn discard_input(&mut self) -> Result<(), MeterError> {
        tokio_serial::SerialPort::clear(self, tokio_serial::ClearBuffer::Input)?;
        Ok(())
    }
}

/// Configuration for serial connection.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baudrate: u32,
    /// Number of `0x55` bytes sent before each frame.
    pub preamble_len: usize,
    /// Pause after the preamble before the frame is sent.
    pub wakeup_settle: Duration,
    pub ack_timeout: Duration,
    pub select_ack_timeout: Duration,
    /// Deadline for the first `0x68` of a response.
    pub sync_timeout: Duration,
    /// Deadline for `L L 68`.
    pub header_timeout: Duration,
    /// Deadline for the complete response frame.
    pub frame_timeout: Duration,
    /// Extra attempts `read_meter` makes after a timeout or format error.
    pub max_retries: u32,
    /// Optical heads powered from the control lines need these raised.
    pub dtr: bool,
    pub rts: bool,
    pub trace_frames: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            baudrate: 2400,
            preamble_len: MBUS_WAKEUP_DEFAULT_LENGTH,
            wakeup_settle: Duration::from_millis(100),
            ack_timeout: Duration::from_millis(1000),
            select_ack_timeout: Duration::from_millis(1200),
            sync_timeout: Duration::from_millis(1500),
            header_timeout: Duration::from_millis(2000),
            frame_timeout: Duration::from_millis(3500),
            max_retries: 2,
            dtr: false,
            rts: false,
            trace_frames: false,
        }
    }
}

/// Handle to one M-Bus line.
pub struct MBusTransport<P: SerialPort> {
    port: P,
    config: SerialConfig,
    trace: FrameTrace,
}

impl MBusTransport<tokio_serial::SerialStream> {
    /// Open `port_name` with 8E1 framing at the configured baud rate.
    pub async fn open(port_name: &str, config: SerialConfig) -> Result<Self, MeterError> {
        let mut port = tokio_serial::new(port_name, config.baudrate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(Framing::Operational.parity())
            .timeout(config.frame_timeout)
            .open_native_async()?;

        tokio_serial::SerialPort::write_data_terminal_ready(&mut port, config.dtr)?;
        tokio_serial::SerialPort::write_request_to_send(&mut port, config.rts)?;
        log::info!(
            "Opened {port_name} at {} baud (DTR={}, RTS={})",
            config.baudrate,
            config.dtr,
            config.rts
        );

        Ok(Self::new(port, config))
    }
}

impl<P: SerialPort> MBusTransport<P> {
    pub fn new(port: P, config: SerialConfig) -> Self {
        let trace = FrameTrace::new(TRACE_TARGET, config.trace_frames);
        MBusTransport {
            port,
            config,
            trace,
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn into_inner(self) -> P {
        self.port
    }

    /// Send the 8N1 preamble and return the line to 8E1.
    pub async fn send_wakeup(&mut self) -> Result<(), MeterError> {
        self.port.set_framing(Framing::WakeUp).await?;
        let preamble = vec![MBUS_WAKEUP_BYTE; self.config.preamble_len];
        self.port.write_all(&preamble).await?;
        self.port.flush().await?;

        self.port.set_framing(Framing::Operational).await?;
        self.port.discard_input().await?;
        log::debug!("Sent wake-up preamble of {} bytes", preamble.len());

        if !self.config.wakeup_settle.is_zero() {
            sleep(self.config.wakeup_settle).await;
        }
        Ok(())
    }

    async fn transmit(&mut self, bytes: &[u8]) -> Result<(), MeterError> {
        self.send_wakeup().await?;
        self.trace.frame("TX", bytes);
        self.port.write_all(bytes).await?;
        self.port.flush().await?;
        Ok(())
    }

    /// Wake the meter and send `10 C A CS 16`.
    pub async fn send_short_frame(&mut self, control: u8, address: u8) -> Result<[u8; 5], MeterError> {
        let frame = pack_short_frame(control, address);
        self.transmit(&frame).await?;
        Ok(frame)
    }

    /// Wait for `0xE5`, ignoring bytes that also occur in `sent`.
    ///
    /// On a half-duplex interface the transmitted frame comes back as echo.
    /// Telling echo apart from a real reply is a guess: a byte of the reply
    /// that happens to occur in `sent` is skipped as well.
    pub async fn wait_for_ack(&mut self, sent: &[u8], bound: Duration) -> Result<(), MeterError> {
        let deadline = Instant::now() + bound;
        loop {
            let byte = self.read_byte_until(deadline, "ACK").await?;
            if byte == MBUS_FRAME_ACK {
                self.trace.byte("RX ACK", byte);
                return Ok(());
            }
            if sent.contains(&byte) {
                self.trace.byte("RX echo", byte);
                continue;
            }
            log::warn!("Unexpected byte 0x{byte:02X} while waiting for ACK");
        }
    }

    /// `SND_NKE` (link reset) and wait for the ACK.
    pub async fn send_nke(&mut self, address: u8) -> Result<(), MeterError> {
        let sent = self.send_short_frame(MBUS_CONTROL_MASK_SND_NKE, address).await?;
        let bound = self.config.ack_timeout;
        self.wait_for_ack(&sent, bound).await
    }

    /// Select a meter by secondary address and wait for the ACK.
    pub async fn select_secondary(&mut self, address: &SecondaryAddress) -> Result<(), MeterError> {
        let frame = pack_frame(&build_secondary_selection_frame(address)?)?;
        log::debug!("Selecting {address}");
        self.transmit(&frame).await?;
        let bound = self.config.select_ack_timeout;
        self.wait_for_ack(&frame, bound).await
    }

    /// Reset the bus and select `address`, tolerating silent meters.
    ///
    /// Meters do not acknowledge a broadcast reset, and many answer
    /// `REQ_UD2` even when the selection ACK got lost, so timeouts are only
    /// logged. Returns whether the selection was acknowledged.
    pub async fn probe(&mut self, address: &SecondaryAddress) -> Result<bool, MeterError> {
        match self.send_nke(MBUS_ADDRESS_BROADCAST_REPLY).await {
            Ok(()) => log::debug!("SND_NKE acknowledged"),
            Err(e) if e.kind() == FailureKind::Timeout => log::debug!("SND_NKE: no ACK"),
            Err(e) => return Err(e),
        }

        match self.select_secondary(address).await {
            Ok(()) => {
                log::info!("Select {address}: ACK");
                Ok(true)
            }
            Err(e) if e.kind() == FailureKind::Timeout => {
                log::warn!("Select {address}: no ACK");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// `REQ_UD2` to `address`, returning the validated user data of the reply.
    pub async fn request_user_data(&mut self, address: u8) -> Result<Vec<u8>, MeterError> {
        self.send_short_frame(MBUS_CONTROL_MASK_REQ_UD2, address).await?;
        self.read_long_frame().await
    }

    /// Receive one long frame and return its user data (C, A, CI, data).
    pub async fn read_long_frame(&mut self) -> Result<Vec<u8>, MeterError> {
        let start = Instant::now();
        let sync_deadline = start + self.config.sync_timeout;
        let header_deadline = start + self.config.header_timeout;
        let frame_deadline = start + self.config.frame_timeout;

        loop {
            let byte = self.read_byte_until(sync_deadline, "long frame start").await?;
            if byte == MBUS_FRAME_LONG_START {
                break;
            }
            self.trace.byte("RX skip", byte);
        }

        let mut header = [0u8; 3];
        self.read_exact_until(&mut header, header_deadline, "long frame header")
            .await?;
        if header[0] != header[1] {
            return Err(MeterError::FormatViolation(format!(
                "length bytes differ: 0x{:02X} 0x{:02X}",
                header[0], header[1]
            )));
        }
        if header[2] != MBUS_FRAME_LONG_START {
            return Err(MeterError::FormatViolation(format!(
                "second start byte is 0x{:02X}",
                header[2]
            )));
        }

        // user data, checksum, stop byte
        let total = header[0] as usize + MBUS_FRAME_LONG_OVERHEAD;
        let mut frame = Vec::with_capacity(total);
        frame.push(MBUS_FRAME_LONG_START);
        frame.extend_from_slice(&header);
        frame.resize(total, 0);
        self.read_exact_until(&mut frame[4..], frame_deadline, "long frame body")
            .await?;

        self.trace.frame("RX", &frame);
        Ok(decode_long_frame(&frame)?.to_vec())
    }

    /// Request and decode one response from `address`.
    ///
    /// Timeouts and malformed frames are retried up to
    /// [`SerialConfig::max_retries`] times. Decoding errors are returned as is.
    pub async fn read_meter(
        &mut self,
        address: u8,
        decoder: &VariableDataDecoder,
    ) -> Result<MBusResponse, MeterError> {
        let mut attempt = 0;
        let user_data = loop {
            match self.request_user_data(address).await {
                Ok(user_data) => break user_data,
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "REQ_UD2 to 0x{address:02X} failed ({e}), retry {attempt}/{}",
                        self.config.max_retries
                    );
                }
                Err(e) => return Err(e),
            }
        };
        decoder.decode(&user_data)
    }

    async fn read_byte_until(&mut self, deadline: Instant, stage: &'static str) -> Result<u8, MeterError> {
        match timeout_at(deadline, self.port.read_u8()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(MeterError::Timeout { stage }),
        }
    }

    async fn read_exact_until(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
        stage: &'static str,
    ) -> Result<(), MeterError> {
        match timeout_at(deadline, self.port.read_exact(buf)).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(MeterError::Timeout { stage }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.baudrate, 2400);
        assert_eq!(config.preamble_len, 504);
        assert_eq!(config.sync_timeout, Duration::from_millis(1500));
        assert_eq!(config.header_timeout, Duration::from_millis(2000));
        assert_eq!(config.frame_timeout, Duration::from_millis(3500));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_framing_parity() {
        assert_eq!(Framing::WakeUp.parity(), tokio_serial::Parity::None);
        assert_eq!(Framing::Operational.parity(), tokio_serial::Parity::Even);
    }
}
