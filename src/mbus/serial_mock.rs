//! Mock serial port implementation for testing
//!
//! This module provides a mock serial port that can be used to test
//! the M-Bus exchanges without requiring actual hardware.
//!
//! Replies queued with [`MockSerialPort::queue_reply`] are held back until
//! the transport flushes a frame under [`Framing::Operational`], the way a
//! meter only answers once a complete request has been sent. A preamble
//! flushed under [`Framing::WakeUp`] releases nothing. With echo enabled,
//! every flushed byte is also looped back into the receive side, like a
//! half-duplex optical head does.
//!
//! Reads on an empty receive buffer stay pending, so the transport's
//! deadlines are what end a silent exchange.

use crate::error::MeterError;
use crate::mbus::frame::{pack_frame, MBusFrame};
use crate::mbus::serial::{Framing, SerialPort};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Mock serial port that simulates bidirectional communication
#[derive(Clone)]
pub struct MockSerialPort {
    /// Data written to the port (outgoing)
    pub tx_buffer: Arc<Mutex<Vec<u8>>>,
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated errors
    pub next_error: Arc<Mutex<Option<io::Error>>>,
    replies: Arc<Mutex<VecDeque<Vec<u8>>>>,
    unflushed: Arc<Mutex<Vec<u8>>>,
    echo: Arc<Mutex<bool>>,
    framing: Arc<Mutex<Framing>>,
    framing_history: Arc<Mutex<Vec<Framing>>>,
    discards: Arc<Mutex<usize>>,
    read_waker: Arc<Mutex<Option<Waker>>>,
}

impl Default for MockSerialPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSerialPort {
    pub fn new() -> Self {
        MockSerialPort {
            tx_buffer: Arc::new(Mutex::new(Vec::new())),
            rx_buffer: Arc::new(Mutex::new(VecDeque::new())),
            next_error: Arc::new(Mutex::new(None)),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            unflushed: Arc::new(Mutex::new(Vec::new())),
            echo: Arc::new(Mutex::new(false)),
            framing: Arc::new(Mutex::new(Framing::Operational)),
            framing_history: Arc::new(Mutex::new(Vec::new())),
            discards: Arc::new(Mutex::new(0)),
            read_waker: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue data that can be read right away
    pub fn queue_rx_data(&self, data: &[u8]) {
        self.rx_buffer.lock().unwrap().extend(data);
        self.wake_reader();
    }

    /// Queue a reply released by the next operational flush
    pub fn queue_reply(&self, data: &[u8]) {
        self.replies.lock().unwrap().push_back(data.to_vec());
    }

    /// Queue an M-Bus frame as the reply to the next request
    pub fn queue_frame_response(&self, frame_type: FrameType) {
        let response = match frame_type {
            FrameType::Ack => Ok(vec![0xE5]),
            FrameType::Short { control, address } => pack_frame(&MBusFrame::short(control, address)),
            FrameType::Long {
                control,
                address,
                ci,
                data,
            } => pack_frame(&MBusFrame::long(control, address, ci, data)),
            FrameType::Invalid => Ok(vec![0xFF, 0xFF, 0xFF]),
        };
        match response {
            Ok(bytes) => self.queue_reply(&bytes),
            Err(e) => log::warn!("Mock reply not queued: {e}"),
        }
    }

    /// Loop flushed bytes back into the receive side
    pub fn set_echo(&self, enabled: bool) {
        *self.echo.lock().unwrap() = enabled;
    }

    /// Get data that was written to the port
    pub fn get_tx_data(&self) -> Vec<u8> {
        self.tx_buffer.lock().unwrap().clone()
    }

    /// Bytes still waiting to be read
    pub fn pending_rx(&self) -> usize {
        self.rx_buffer.lock().unwrap().len()
    }

    /// Replies not yet released
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    pub fn framing(&self) -> Framing {
        *self.framing.lock().unwrap()
    }

    /// Every framing change requested, in order
    pub fn framing_history(&self) -> Vec<Framing> {
        self.framing_history.lock().unwrap().clone()
    }

    pub fn discard_count(&self) -> usize {
        *self.discards.lock().unwrap()
    }

    /// Clear all buffers
    pub fn clear(&self) {
        self.tx_buffer.lock().unwrap().clear();
        self.rx_buffer.lock().unwrap().clear();
        self.replies.lock().unwrap().clear();
        self.unflushed.lock().unwrap().clear();
    }

    /// Set an error to be returned on the next operation
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    fn wake_reader(&self) {
        if let Some(waker) = self.read_waker.lock().unwrap().take() {
            waker.wake();
        }
    }
}

/// Canned replies for [`MockSerialPort::queue_frame_response`]
pub enum FrameType {
    Ack,
    Short {
        control: u8,
        address: u8,
    },
    Long {
        control: u8,
        address: u8,
        ci: u8,
        data: Vec<u8>,
    },
    Invalid,
}

#[async_trait]
impl SerialPort for MockSerialPort {
    async fn set_framing(&mut self, framing: Framing) -> Result<(), MeterError> {
        *self.framing.lock().unwrap() = framing;
        self.framing_history.lock().unwrap().push(framing);
        Ok(())
    }

    async fn discard_input(&mut self) -> Result<(), MeterError> {
        self.rx_buffer.lock().unwrap().clear();
        *self.discards.lock().unwrap() += 1;
        Ok(())
    }
}

// Implement AsyncRead for MockSerialPort
impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // Check for simulated error
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        let mut rx = self.rx_buffer.lock().unwrap();
        if rx.is_empty() {
            *self.read_waker.lock().unwrap() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let available = rx.len().min(buf.remaining());
        let data: Vec<u8> = rx.drain(..available).collect();
        buf.put_slice(&data);
        Poll::Ready(Ok(()))
    }
}

// Implement AsyncWrite for MockSerialPort
impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        // Check for simulated error
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        self.tx_buffer.lock().unwrap().extend_from_slice(buf);
        self.unflushed.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let written = std::mem::take(&mut *self.unflushed.lock().unwrap());
        if written.is_empty() {
            return Poll::Ready(Ok(()));
        }

        {
            let mut rx = self.rx_buffer.lock().unwrap();
            if *self.echo.lock().unwrap() {
                rx.extend(&written);
            }
            if self.framing() == Framing::Operational {
                if let Some(reply) = self.replies.lock().unwrap().pop_front() {
                    rx.extend(reply);
                }
            }
        }
        self.wake_reader();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_mock_serial_port_creation() {
        let port = MockSerialPort::new();
        assert_eq!(port.get_tx_data().len(), 0);
        assert_eq!(port.framing(), Framing::Operational);
    }

    #[test]
    fn test_queue_and_read_data() {
        let port = MockSerialPort::new();
        port.queue_rx_data(&[0x01, 0x02, 0x03]);
        assert_eq!(port.pending_rx(), 3);
    }

    #[test]
    fn test_queue_long_frame() {
        let port = MockSerialPort::new();
        port.queue_frame_response(FrameType::Long {
            control: 0x08,
            address: 0x01,
            ci: 0x72,
            data: vec![0x01, 0x02, 0x03],
        });
        let reply = port.replies.lock().unwrap().pop_front().unwrap();
        assert_eq!(&reply[..4], &[0x68, 0x06, 0x06, 0x68]);
        assert_eq!(reply[reply.len() - 1], 0x16);
    }

    #[tokio::test]
    async fn test_reply_released_on_operational_flush() {
        let mut port = MockSerialPort::new();
        port.queue_frame_response(FrameType::Ack);

        port.set_framing(Framing::WakeUp).await.unwrap();
        port.write_all(&[0x55; 4]).await.unwrap();
        port.flush().await.unwrap();
        assert_eq!(port.pending_rx(), 0);
        assert_eq!(port.pending_replies(), 1);

        port.set_framing(Framing::Operational).await.unwrap();
        port.write_all(&[0x10, 0x40, 0xFE, 0x3E, 0x16]).await.unwrap();
        port.flush().await.unwrap();
        assert_eq!(port.read_u8().await.unwrap(), 0xE5);
        assert_eq!(
            port.framing_history(),
            vec![Framing::WakeUp, Framing::Operational]
        );
    }

    #[tokio::test]
    async fn test_echo_then_discard() {
        let mut port = MockSerialPort::new();
        port.set_echo(true);
        port.write_all(&[0x55, 0x55]).await.unwrap();
        port.flush().await.unwrap();
        assert_eq!(port.pending_rx(), 2);

        port.discard_input().await.unwrap();
        assert_eq!(port.pending_rx(), 0);
        assert_eq!(port.discard_count(), 1);
    }

    #[test]
    fn test_clear_buffers() {
        let port = MockSerialPort::new();
        port.queue_rx_data(&[1, 2, 3]);
        port.queue_reply(&[0xE5]);
        port.clear();
        assert_eq!(port.pending_rx(), 0);
        assert_eq!(port.pending_replies(), 0);
    }
}
