//! System messages exchanged during device negotiation.

use std::fmt;

use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{encode_packet, CommandFlags, CommandHeader};
use crate::command;
use crate::error::{FrameError, Result};

/// Size of one keystroke record.
pub const KEYSTROKE_SIZE: usize = 2;

/// Key code the guide button reports in keystroke messages.
pub const GUIDE_KEY_CODE: u8 = 0x5B;

const ARRIVAL_SIZE: usize = 28;
const STATUS_SIZE: usize = 4;
const ACKNOWLEDGEMENT_SIZE: usize = 9;
const SERIAL_MASK: u64 = 0xFFFF_FFFF_FFFF;

/// Next outbound sequence count after `previous`.
///
/// Sequence counts wrap from 0xFF back to 1; zero is reserved for
/// "nothing sent yet".
pub fn next_sequence(previous: u8) -> u8 {
    if previous == u8::MAX {
        1
    } else {
        previous + 1
    }
}

/// A four-part firmware or hardware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    pub revision: u16,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Identity a client announces when it first connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Arrival {
    /// Serial number; only the low 48 bits are significant.
    pub serial: u64,
    pub vendor_id: u16,
    pub product_id: u16,
    pub firmware_version: Version,
    pub hardware_version: Version,
}

impl Arrival {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ARRIVAL_SIZE {
            return Err(FrameError::MalformedPayload {
                command: command::ARRIVAL,
                len: data.len(),
            });
        }

        let mut buf = data;
        Ok(Self {
            serial: buf.get_u64_le() & SERIAL_MASK,
            vendor_id: buf.get_u16_le(),
            product_id: buf.get_u16_le(),
            firmware_version: read_version(&mut buf),
            hardware_version: read_version(&mut buf),
        })
    }

    /// Serialize back into the arrival payload layout.
    pub fn encode(&self) -> Bytes {
        use bytes::BufMut;

        let mut buf = BytesMut::with_capacity(ARRIVAL_SIZE);
        buf.put_u64_le(self.serial & SERIAL_MASK);
        buf.put_u16_le(self.vendor_id);
        buf.put_u16_le(self.product_id);
        for version in [self.firmware_version, self.hardware_version] {
            buf.put_u16_le(version.major);
            buf.put_u16_le(version.minor);
            buf.put_u16_le(version.build);
            buf.put_u16_le(version.revision);
        }
        buf.freeze()
    }
}

fn read_version(buf: &mut &[u8]) -> Version {
    Version {
        major: buf.get_u16_le(),
        minor: buf.get_u16_le(),
        build: buf.get_u16_le(),
        revision: buf.get_u16_le(),
    }
}

/// Connectivity and battery report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    battery: u8,
}

impl Status {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < STATUS_SIZE {
            return Err(FrameError::MalformedPayload {
                command: command::STATUS,
                len: data.len(),
            });
        }
        Ok(Self { battery: data[0] })
    }

    pub fn connected(&self) -> bool {
        self.battery & 0x80 != 0
    }

    /// Battery level, 0 (critical) to 3 (full).
    pub fn battery_level(&self) -> u8 {
        self.battery & 0x03
    }

    /// Battery type: 0 wired, 1 standard, 2 rechargeable kit, 3 unknown.
    pub fn battery_type(&self) -> u8 {
        (self.battery >> 2) & 0x03
    }
}

/// One key event from a keystroke message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keystroke {
    pub pressed: bool,
    pub key_code: u8,
}

impl Keystroke {
    /// Parse a packed array of keystroke records.
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        if data.len() % KEYSTROKE_SIZE != 0 {
            return Err(FrameError::MalformedPayload {
                command: command::KEYSTROKE,
                len: data.len(),
            });
        }

        Ok(data
            .chunks_exact(KEYSTROKE_SIZE)
            .map(|record| Self {
                pressed: record[0] != 0,
                key_code: record[1],
            })
            .collect())
    }

    pub fn is_guide(&self) -> bool {
        self.key_code == GUIDE_KEY_CODE
    }
}

/// Acknowledgement payload.
///
/// For chunked transfers the acknowledgement doubles as flow control: it tells
/// the sender how much of the chunk buffer has been consumed and how much room
/// is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgement {
    pub inner_command: u8,
    /// Flags and client id of the acknowledged message, in header byte layout.
    pub inner_flags: u8,
    pub bytes_received: u16,
    pub bytes_remaining: u16,
}

impl Acknowledgement {
    /// Build the acknowledgement for `header`.
    pub fn for_message(header: &CommandHeader, bytes_received: usize, bytes_remaining: usize) -> Self {
        let flags = header.flags - CommandFlags::NEEDS_ACKNOWLEDGEMENT;
        Self {
            inner_command: header.command_id,
            inner_flags: flags.bits() | (header.client_id & 0x0F),
            bytes_received: clamp_u16(bytes_received),
            bytes_remaining: clamp_u16(bytes_remaining),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ACKNOWLEDGEMENT_SIZE {
            return Err(FrameError::MalformedPayload {
                command: command::ACKNOWLEDGEMENT,
                len: data.len(),
            });
        }

        let mut buf = &data[1..];
        let inner_command = buf.get_u8();
        let inner_flags = buf.get_u8();
        let bytes_received = buf.get_u16_le();
        let _reserved = buf.get_u16_le();
        let bytes_remaining = buf.get_u16_le();
        Ok(Self {
            inner_command,
            inner_flags,
            bytes_received,
            bytes_remaining,
        })
    }

    pub fn encode(&self) -> [u8; ACKNOWLEDGEMENT_SIZE] {
        let received = self.bytes_received.to_le_bytes();
        let remaining = self.bytes_remaining.to_le_bytes();
        [
            0,
            self.inner_command,
            self.inner_flags,
            received[0],
            received[1],
            0,
            0,
            remaining[0],
            remaining[1],
        ]
    }

    /// Wrap into a message answering `original`.
    ///
    /// The acknowledgement echoes the original client and sequence count
    /// instead of taking a fresh outbound sequence.
    pub fn into_message(self, original: &CommandHeader) -> Message {
        let mut message = Message::system(command::ACKNOWLEDGEMENT, self.encode().to_vec());
        message.header.client_id = original.client_id;
        message.header.sequence = original.sequence;
        message
    }
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// One outbound message: a header plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: CommandHeader,
    pub data: Bytes,
}

impl Message {
    /// Create a message; the header's payload length is taken from `data`.
    pub fn new(command_id: u8, flags: CommandFlags, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mut header = CommandHeader::new(command_id, flags);
        header.data_length = data.len();
        Self { header, data }
    }

    /// Create a system command message.
    pub fn system(command_id: u8, data: impl Into<Bytes>) -> Self {
        Self::new(command_id, CommandFlags::SYSTEM_COMMAND, data)
    }

    /// Ask the client for its capability descriptor.
    pub fn descriptor_request() -> Self {
        Self::system(command::DESCRIPTOR, Bytes::new())
    }

    pub fn power_on() -> Self {
        Self::system(command::CONFIGURATION, Bytes::from_static(&[0x00]))
    }

    pub fn power_off() -> Self {
        Self::system(command::CONFIGURATION, Bytes::from_static(&[0x04]))
    }

    pub fn reset() -> Self {
        Self::system(command::CONFIGURATION, Bytes::from_static(&[0x07]))
    }

    /// Turn the guide button LED on at normal brightness.
    pub fn led_enable() -> Self {
        Self::system(command::LED, Bytes::from_static(&[0x00, 0x01, 0x14]))
    }

    /// Report a completed authentication.
    ///
    /// No challenge/response is performed; every device is reported as
    /// authenticated.
    pub fn authentication_success() -> Self {
        Self::system(command::AUTHENTICATION, Bytes::from_static(&[0x01, 0x00]))
    }

    /// Continuous rumble on both motors.
    pub fn gamepad_rumble(left: u8, right: u8) -> Self {
        const LEFT_AND_RIGHT_MOTORS: u8 = 0x03;
        let data = vec![0x00, LEFT_AND_RIGHT_MOTORS, 0x00, 0x00, left, right, 0xFF, 0x00, 0xEB];
        Self::new(command::GAMEPAD_RUMBLE, CommandFlags::empty(), data)
    }

    /// Encode header and payload into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_packet(&self.header, &self.data, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guitar_arrival() -> Arrival {
        Arrival {
            serial: 0x7E_D8_41_23_45_67,
            vendor_id: 0x0738,
            product_id: 0x4161,
            firmware_version: Version {
                major: 1,
                minor: 2,
                build: 3,
                revision: 4,
            },
            hardware_version: Version::default(),
        }
    }

    #[test]
    fn sequence_wraps_past_zero() {
        assert_eq!(next_sequence(0), 1);
        assert_eq!(next_sequence(0x41), 0x42);
        assert_eq!(next_sequence(0xFF), 1);
    }

    #[test]
    fn arrival_parse_reads_identity() {
        let arrival = guitar_arrival();
        let parsed = Arrival::parse(&arrival.encode()).unwrap();
        assert_eq!(parsed, arrival);
        assert_eq!(parsed.firmware_version.to_string(), "1.2.3.4");
    }

    #[test]
    fn arrival_masks_serial_to_48_bits() {
        let mut data = guitar_arrival().encode().to_vec();
        data[6] = 0xAB;
        data[7] = 0xCD;
        let parsed = Arrival::parse(&data).unwrap();
        assert_eq!(parsed.serial, 0x7E_D8_41_23_45_67);
    }

    #[test]
    fn arrival_rejects_short_payload() {
        assert!(matches!(
            Arrival::parse(&[0u8; 12]),
            Err(FrameError::MalformedPayload {
                command: 0x02,
                len: 12
            })
        ));
    }

    #[test]
    fn status_connected_bit() {
        let status = Status::parse(&[0x86, 0, 0, 0]).unwrap();
        assert!(status.connected());
        assert_eq!(status.battery_level(), 2);
        assert_eq!(status.battery_type(), 1);

        let status = Status::parse(&[0x06, 0, 0, 0]).unwrap();
        assert!(!status.connected());
    }

    #[test]
    fn keystrokes_parse_in_order() {
        let keys = Keystroke::parse_all(&[0x01, 0x5B, 0x00, 0x5B]).unwrap();
        assert_eq!(
            keys,
            vec![
                Keystroke {
                    pressed: true,
                    key_code: GUIDE_KEY_CODE
                },
                Keystroke {
                    pressed: false,
                    key_code: GUIDE_KEY_CODE
                },
            ]
        );
        assert!(keys[0].is_guide());
    }

    #[test]
    fn keystrokes_reject_partial_record() {
        assert!(Keystroke::parse_all(&[0x01, 0x5B, 0x00]).is_err());
    }

    #[test]
    fn acknowledgement_echoes_original_header() {
        let original = CommandHeader {
            command_id: command::DESCRIPTOR,
            client_id: 2,
            flags: CommandFlags::SYSTEM_COMMAND
                | CommandFlags::CHUNK_PACKET
                | CommandFlags::NEEDS_ACKNOWLEDGEMENT,
            sequence: 0x33,
            chunk_index: 0x3A,
            data_length: 0x3A,
        };
        let ack = Acknowledgement::for_message(&original, 0x74, 0x150);
        let message = ack.into_message(&original);

        assert_eq!(message.header.command_id, command::ACKNOWLEDGEMENT);
        assert_eq!(message.header.client_id, 2);
        assert_eq!(message.header.sequence, 0x33);
        assert!(message.header.is_system());
        assert!(!message.header.needs_acknowledgement());
        assert_eq!(
            message.data.as_ref(),
            &[0x00, 0x04, 0xA2, 0x74, 0x00, 0x00, 0x00, 0x50, 0x01]
        );

        let parsed = Acknowledgement::parse(&message.data).unwrap();
        assert_eq!(parsed, ack);
    }

    #[test]
    fn outbound_messages_have_expected_layout() {
        let mut buf = BytesMut::new();
        let mut power_on = Message::power_on();
        power_on.header.sequence = 1;
        power_on.encode(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x05, 0x20, 0x01, 0x01, 0x00]);

        let request = Message::descriptor_request();
        assert_eq!(request.header.command_id, command::DESCRIPTOR);
        assert!(request.data.is_empty());

        let rumble = Message::gamepad_rumble(0x40, 0x80);
        assert!(!rumble.header.is_system());
        assert_eq!(rumble.header.data_length, 9);
        assert_eq!(rumble.data[4], 0x40);
        assert_eq!(rumble.data[5], 0x80);
    }
}
