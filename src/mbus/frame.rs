//! # M-Bus Frame Codec
//!
//! Packing, parsing and verification of the M-Bus link layer frames
//! (EN 13757-2). Parsing is built on `nom`; the typed entry point
//! [`decode_frame`] additionally checks the checksum and maps parser failures
//! onto [`MeterError`].
//!
//! ## Frame formats
//! - ACK: `E5`
//! - Short: `10 C A CS 16`, `CS = (C + A) mod 256`
//! - Long: `68 L L 68 C A CI data.. CS 16`, `CS = sum(C A CI data) mod 256`
//! - Control: a long frame with `L == 3` (no data)
//!
//! ```rust
//! use metering_rs::mbus::frame::{decode_frame, pack_short_frame, MBusFrameType};
//!
//! let bytes = pack_short_frame(0x40, 0x71);
//! assert_eq!(bytes, [0x10, 0x40, 0x71, 0xB1, 0x16]);
//!
//! let frame = decode_frame(&bytes).unwrap();
//! assert_eq!(frame.frame_type, MBusFrameType::Short);
//! assert_eq!((frame.control, frame.address), (0x40, 0x71));
//! ```

use crate::constants::{
    MBUS_FRAME_ACK, MBUS_FRAME_LONG_OVERHEAD, MBUS_FRAME_LONG_START, MBUS_FRAME_SHORT_START,
    MBUS_FRAME_STOP,
};
use crate::error::MeterError;
use nom::{
    bytes::complete::{tag, take},
    error::{Error as NomError, ErrorKind},
    number::complete::be_u8,
    sequence::tuple,
    Err as NomErr, IResult,
};

const LONG_START: &[u8] = &[MBUS_FRAME_LONG_START];
const SHORT_START: &[u8] = &[MBUS_FRAME_SHORT_START];
const STOP: &[u8] = &[MBUS_FRAME_STOP];

/// Represents an M-Bus frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MBusFrame {
    pub frame_type: MBusFrameType,
    pub control: u8,
    pub address: u8,
    pub control_information: u8,
    pub data: Vec<u8>,
    pub checksum: u8,
}

/// Represents the different types of M-Bus frames.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MBusFrameType {
    Ack,
    Short,
    Control,
    Long,
}

impl MBusFrame {
    pub fn ack() -> Self {
        MBusFrame {
            frame_type: MBusFrameType::Ack,
            control: 0,
            address: 0,
            control_information: 0,
            data: Vec::new(),
            checksum: 0,
        }
    }

    /// Short frame with its checksum filled in.
    pub fn short(control: u8, address: u8) -> Self {
        MBusFrame {
            frame_type: MBusFrameType::Short,
            control,
            address,
            control_information: 0,
            data: Vec::new(),
            checksum: control.wrapping_add(address),
        }
    }

    /// Long (or control, when `data` is empty) frame with its checksum filled in.
    pub fn long(control: u8, address: u8, control_information: u8, data: Vec<u8>) -> Self {
        let frame_type = if data.is_empty() {
            MBusFrameType::Control
        } else {
            MBusFrameType::Long
        };
        let mut frame = MBusFrame {
            frame_type,
            control,
            address,
            control_information,
            data,
            checksum: 0,
        };
        frame.checksum = calculate_checksum(&frame);
        frame
    }

    /// C, A, CI followed by the data bytes, as carried between the two
    /// envelope halves of a long frame.
    pub fn user_data(&self) -> Vec<u8> {
        let mut user_data = Vec::with_capacity(self.data.len() + 3);
        user_data.extend_from_slice(&[self.control, self.address, self.control_information]);
        user_data.extend_from_slice(&self.data);
        user_data
    }
}

/// Low byte of the sum of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Build the 5-byte short frame `10 C A CS 16`.
pub fn pack_short_frame(control: u8, address: u8) -> [u8; 5] {
    [
        MBUS_FRAME_SHORT_START,
        control,
        address,
        control.wrapping_add(address),
        MBUS_FRAME_STOP,
    ]
}

/// Wrap raw user data into a long frame envelope.
pub fn pack_long_frame(user_data: &[u8]) -> Result<Vec<u8>, MeterError> {
    let len = u8::try_from(user_data.len()).map_err(|_| {
        MeterError::FormatViolation(format!(
            "user data of {} bytes does not fit a long frame",
            user_data.len()
        ))
    })?;

    let mut data = Vec::with_capacity(user_data.len() + MBUS_FRAME_LONG_OVERHEAD);
    data.extend_from_slice(&[MBUS_FRAME_LONG_START, len, len, MBUS_FRAME_LONG_START]);
    data.extend_from_slice(user_data);
    data.push(checksum(user_data));
    data.push(MBUS_FRAME_STOP);
    Ok(data)
}

/// Packs an M-Bus frame into a byte vector, using the frame's stored checksum.
///
/// Fails when C, A, CI and the data together exceed the 255 bytes an L field
/// can describe.
pub fn pack_frame(frame: &MBusFrame) -> Result<Vec<u8>, MeterError> {
    match frame.frame_type {
        MBusFrameType::Ack => Ok(vec![MBUS_FRAME_ACK]),
        MBusFrameType::Short => Ok(vec![
            MBUS_FRAME_SHORT_START,
            frame.control,
            frame.address,
            frame.checksum,
            MBUS_FRAME_STOP,
        ]),
        MBusFrameType::Control | MBusFrameType::Long => {
            let user_len = frame.data.len() + 3;
            let len = u8::try_from(user_len).map_err(|_| {
                MeterError::FormatViolation(format!(
                    "user data of {user_len} bytes does not fit a long frame"
                ))
            })?;
            let mut data = vec![MBUS_FRAME_LONG_START, len, len, MBUS_FRAME_LONG_START];
            data.extend_from_slice(&[frame.control, frame.address, frame.control_information]);
            data.extend_from_slice(&frame.data);
            data.push(frame.checksum);
            data.push(MBUS_FRAME_STOP);
            Ok(data)
        }
    }
}

/// Verifies the checksum of an M-Bus frame.
pub fn verify_frame(frame: &MBusFrame) -> Result<(), MeterError> {
    let calculated = calculate_checksum(frame);
    if frame.checksum != calculated {
        return Err(MeterError::InvalidChecksum {
            expected: frame.checksum,
            calculated,
        });
    }
    Ok(())
}

fn calculate_checksum(frame: &MBusFrame) -> u8 {
    match frame.frame_type {
        MBusFrameType::Ack => 0,
        MBusFrameType::Short => frame.control.wrapping_add(frame.address),
        MBusFrameType::Control | MBusFrameType::Long => checksum(&frame.user_data()),
    }
}

/// Long frame envelope: returns the user data and the transmitted checksum.
///
/// Start bytes, length doubling and the stop byte are enforced here, the
/// checksum is left to the caller.
pub fn parse_long_frame(input: &[u8]) -> IResult<&[u8], (&[u8], u8)> {
    let (input, _) = tag(LONG_START)(input)?;
    let (rest, (len1, len2)) = tuple((be_u8, be_u8))(input)?;
    if len1 != len2 {
        return Err(NomErr::Error(NomError::new(input, ErrorKind::Verify)));
    }
    let (input, _) = tag(LONG_START)(rest)?;
    let (input, user_data) = take(len1)(input)?;
    let (input, checksum) = be_u8(input)?;
    let (input, _) = tag(STOP)(input)?;
    Ok((input, (user_data, checksum)))
}

/// Short frame: returns `(C, A, CS)`.
pub fn parse_short_frame(input: &[u8]) -> IResult<&[u8], (u8, u8, u8)> {
    let (input, _) = tag(SHORT_START)(input)?;
    let (input, fields) = tuple((be_u8, be_u8, be_u8))(input)?;
    let (input, _) = tag(STOP)(input)?;
    Ok((input, fields))
}

/// Uses `nom` to parse any M-Bus frame from a byte slice.
pub fn parse_frame(input: &[u8]) -> IResult<&[u8], MBusFrame> {
    match input.first() {
        Some(&MBUS_FRAME_ACK) => Ok((&input[1..], MBusFrame::ack())),
        Some(&MBUS_FRAME_SHORT_START) => {
            let (rest, (control, address, checksum)) = parse_short_frame(input)?;
            Ok((
                rest,
                MBusFrame {
                    frame_type: MBusFrameType::Short,
                    control,
                    address,
                    control_information: 0,
                    data: Vec::new(),
                    checksum,
                },
            ))
        }
        Some(&MBUS_FRAME_LONG_START) => {
            let (rest, (user_data, checksum)) = parse_long_frame(input)?;
            if user_data.len() < 3 {
                return Err(NomErr::Error(NomError::new(input, ErrorKind::LengthValue)));
            }
            let frame_type = if user_data.len() == 3 {
                MBusFrameType::Control
            } else {
                MBusFrameType::Long
            };
            Ok((
                rest,
                MBusFrame {
                    frame_type,
                    control: user_data[0],
                    address: user_data[1],
                    control_information: user_data[2],
                    data: user_data[3..].to_vec(),
                    checksum,
                },
            ))
        }
        _ => Err(NomErr::Error(NomError::new(input, ErrorKind::Tag))),
    }
}

/// Parse and verify a complete frame.
pub fn decode_frame(input: &[u8]) -> Result<MBusFrame, MeterError> {
    let (_, frame) = parse_frame(input).map_err(frame_error)?;
    verify_frame(&frame)?;
    Ok(frame)
}

/// Validate a long frame envelope of any length and return its user data.
pub fn decode_long_frame(input: &[u8]) -> Result<&[u8], MeterError> {
    let (_, (user_data, transmitted)) = parse_long_frame(input).map_err(frame_error)?;
    let calculated = checksum(user_data);
    if calculated != transmitted {
        return Err(MeterError::InvalidChecksum {
            expected: transmitted,
            calculated,
        });
    }
    Ok(user_data)
}

/// Map a nom failure onto the crate's frame-level error.
pub fn frame_error(err: NomErr<NomError<&[u8]>>) -> MeterError {
    match err {
        NomErr::Incomplete(_) => MeterError::FormatViolation("incomplete frame".into()),
        NomErr::Error(e) | NomErr::Failure(e) => {
            let reason = match e.code {
                ErrorKind::Verify => "length bytes differ",
                ErrorKind::LengthValue => "user data shorter than C/A/CI",
                ErrorKind::Eof => "truncated frame",
                ErrorKind::Tag => "unexpected start or stop byte",
                _ => "malformed frame",
            };
            MeterError::FormatViolation(format!("{reason} ({} bytes left)", e.input.len()))
        }
    }
}
