//! Tests for the M-Bus request/response exchange against `MockSerialPort`.

use metering_rs::error::MeterError;
use metering_rs::mbus::frame::{pack_frame, pack_long_frame, pack_short_frame};
use metering_rs::mbus::secondary_addressing::build_secondary_selection_frame;
use metering_rs::mbus::serial_mock::{FrameType, MockSerialPort};
use metering_rs::{Framing, MBusTransport, SecondaryAddress, SerialConfig, VariableDataDecoder};
use std::time::Duration;

const PREAMBLE: usize = 8;

/// Header after CI: identification 51158148, KAM, heat, access 0x01.
const HEADER: [u8; 12] = [
    0x48, 0x81, 0x15, 0x51, 0x2D, 0x2C, 0x01, 0x04, 0x01, 0x00, 0x00, 0x00,
];

fn test_config() -> SerialConfig {
    SerialConfig {
        preamble_len: PREAMBLE,
        wakeup_settle: Duration::ZERO,
        ack_timeout: Duration::from_millis(100),
        select_ack_timeout: Duration::from_millis(100),
        sync_timeout: Duration::from_millis(150),
        header_timeout: Duration::from_millis(200),
        frame_timeout: Duration::from_millis(300),
        max_retries: 1,
        ..SerialConfig::default()
    }
}

fn transport(port: &MockSerialPort) -> MBusTransport<MockSerialPort> {
    MBusTransport::new(port.clone(), test_config())
}

fn energy_response() -> FrameType {
    let mut data = HEADER.to_vec();
    data.extend_from_slice(&[0x04, 0x06, 0xE8, 0x03, 0x00, 0x00, 0x02, 0x5B, 0x46, 0x00]);
    FrameType::Long {
        control: 0x08,
        address: 0x01,
        ci: 0x72,
        data,
    }
}

fn energy_frame_bytes() -> Vec<u8> {
    let mut user_data = vec![0x08, 0x01, 0x72];
    user_data.extend_from_slice(&HEADER);
    user_data.extend_from_slice(&[0x04, 0x06, 0xE8, 0x03, 0x00, 0x00]);
    pack_long_frame(&user_data).unwrap()
}

fn count_frames(tx: &[u8], frame: &[u8]) -> usize {
    tx.windows(frame.len()).filter(|w| *w == frame).count()
}

/// Tests that every frame goes out after an 8N1 preamble on an 8E1 line.
#[tokio::test]
async fn test_wakeup_precedes_frame() {
    let port = MockSerialPort::new();
    port.queue_frame_response(FrameType::Ack);
    let mut transport = transport(&port);

    transport.send_nke(0x01).await.unwrap();

    let mut expected = vec![0x55; PREAMBLE];
    expected.extend_from_slice(&[0x10, 0x40, 0x01, 0x41, 0x16]);
    assert_eq!(port.get_tx_data(), expected);
    assert_eq!(
        port.framing_history(),
        vec![Framing::WakeUp, Framing::Operational]
    );
    assert_eq!(port.framing(), Framing::Operational);
    assert_eq!(port.discard_count(), 1);
}

/// Tests that the echo of the transmitted frame is not mistaken for a reply.
#[tokio::test]
async fn test_ack_after_echo() {
    let port = MockSerialPort::new();
    port.set_echo(true);
    port.queue_frame_response(FrameType::Ack);
    let mut transport = transport(&port);

    transport.send_nke(0x01).await.unwrap();
    assert_eq!(port.pending_rx(), 0);
}

/// Tests that a silent meter ends the ACK wait with a timeout.
#[tokio::test]
async fn test_ack_timeout() {
    let port = MockSerialPort::new();
    let mut transport = transport(&port);

    let err = transport.send_nke(0x01).await.unwrap_err();
    assert!(matches!(err, MeterError::Timeout { stage: "ACK" }));
    assert!(err.is_retryable());
}

/// Tests that probing tolerates an unacknowledged broadcast reset.
#[tokio::test]
async fn test_probe_selects_after_silent_reset() {
    let port = MockSerialPort::new();
    port.queue_reply(&[]); // no answer to the broadcast SND_NKE
    port.queue_frame_response(FrameType::Ack);
    let mut transport = transport(&port);

    let address = SecondaryAddress::serial("51158148");
    assert!(transport.probe(&address).await.unwrap());

    let tx = port.get_tx_data();
    assert_eq!(count_frames(&tx, &pack_short_frame(0x40, 0xFE)), 1);
    let selection = pack_frame(&build_secondary_selection_frame(&address).unwrap()).unwrap();
    assert_eq!(
        &selection[4..15],
        &[0x53, 0xFD, 0x52, 0x48, 0x81, 0x15, 0x51, 0xFF, 0xFF, 0xFF, 0xFF]
    );
    assert_eq!(count_frames(&tx, &selection), 1);
}

/// Tests that a missing selection ACK is reported but not fatal.
#[tokio::test]
async fn test_probe_without_any_ack() {
    let port = MockSerialPort::new();
    let mut transport = transport(&port);

    let acknowledged = transport.probe(&SecondaryAddress::wildcard()).await.unwrap();
    assert!(!acknowledged);
}

/// Tests a complete REQ_UD2 exchange decoded into readings.
#[tokio::test]
async fn test_read_meter() {
    let port = MockSerialPort::new();
    port.set_echo(true);
    port.queue_frame_response(energy_response());
    let mut transport = transport(&port);

    let response = transport
        .read_meter(0xFD, &VariableDataDecoder::default())
        .await
        .unwrap();

    assert_eq!(response.header.identification, "51158148");
    assert_eq!(response.readings[0].formatted_value, "1.000 MWh");
    assert_eq!(response.instants[0].formatted_value, "70 °C");
    assert_eq!(
        count_frames(&port.get_tx_data(), &[0x10, 0x5B, 0xFD, 0x58, 0x16]),
        1
    );
}

/// Tests that a garbled first answer is followed by one more request.
#[tokio::test]
async fn test_read_meter_retries_after_timeout() {
    let port = MockSerialPort::new();
    port.queue_frame_response(FrameType::Invalid);
    port.queue_frame_response(energy_response());
    let mut transport = transport(&port);

    let response = transport
        .read_meter(0xFD, &VariableDataDecoder::default())
        .await
        .unwrap();
    assert_eq!(response.readings.len(), 1);
    assert_eq!(
        count_frames(&port.get_tx_data(), &pack_short_frame(0x5B, 0xFD)),
        2
    );
}

/// Tests that a checksum error is retried like a timeout.
#[tokio::test]
async fn test_read_meter_retries_after_bad_checksum() {
    let port = MockSerialPort::new();
    let mut corrupted = energy_frame_bytes();
    let checksum_index = corrupted.len() - 2;
    corrupted[checksum_index] ^= 0x01;
    port.queue_reply(&corrupted);
    port.queue_reply(&energy_frame_bytes());
    let mut transport = transport(&port);

    let response = transport
        .read_meter(0xFD, &VariableDataDecoder::default())
        .await
        .unwrap();
    assert_eq!(response.readings[0].label, "Energie");
}

/// Tests that the last error is returned once the retries are used up.
#[tokio::test]
async fn test_read_meter_gives_up() {
    let port = MockSerialPort::new();
    let mut transport = transport(&port);

    let err = transport
        .read_meter(0xFD, &VariableDataDecoder::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MeterError::Timeout {
            stage: "long frame start"
        }
    ));
    assert_eq!(
        count_frames(&port.get_tx_data(), &pack_short_frame(0x5B, 0xFD)),
        2
    );
}

/// Tests that a frame cut short after its header times out in the body stage.
#[tokio::test]
async fn test_truncated_frame_times_out() {
    let port = MockSerialPort::new();
    port.queue_reply(&[0x68, 0x20, 0x20, 0x68, 0x08, 0x01, 0x72]);
    let mut transport = transport(&port);

    transport.send_short_frame(0x5B, 0xFD).await.unwrap();
    let err = transport.read_long_frame().await.unwrap_err();
    assert!(matches!(
        err,
        MeterError::Timeout {
            stage: "long frame body"
        }
    ));
}

/// Tests that differing length bytes are rejected before the body is read.
#[tokio::test]
async fn test_length_mismatch_rejected() {
    let port = MockSerialPort::new();
    port.queue_reply(&[0x68, 0x03, 0x04, 0x68, 0x08, 0x01, 0x72, 0x7B, 0x16]);
    let mut transport = transport(&port);

    transport.send_short_frame(0x5B, 0xFD).await.unwrap();
    let err = transport.read_long_frame().await.unwrap_err();
    assert!(matches!(err, MeterError::FormatViolation(_)));
}

/// Tests that a response with another CI is not retried.
#[tokio::test]
async fn test_unsupported_ci_not_retried() {
    let port = MockSerialPort::new();
    port.queue_frame_response(FrameType::Long {
        control: 0x08,
        address: 0x01,
        ci: 0x78,
        data: vec![0x00; 12],
    });
    let mut transport = transport(&port);

    let err = transport
        .read_meter(0xFD, &VariableDataDecoder::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MeterError::UnsupportedControlInformation(0x78)));
    assert_eq!(
        count_frames(&port.get_tx_data(), &pack_short_frame(0x5B, 0xFD)),
        1
    );
}

/// Tests that port errors surface without retrying.
#[tokio::test]
async fn test_io_error_propagates() {
    let port = MockSerialPort::new();
    port.set_next_error(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "cable unplugged",
    ));
    let mut transport = transport(&port);

    let err = transport
        .read_meter(0xFD, &VariableDataDecoder::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MeterError::SerialPortError(ref m) if m.contains("cable unplugged")));
    assert!(port.get_tx_data().is_empty());
}
