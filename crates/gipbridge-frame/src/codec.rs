use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Smallest possible header: command (1) + flags/client (1) + sequence (1) + length (1).
pub const MIN_HEADER_SIZE: usize = 4;

/// Largest client id that fits in the flags byte.
pub const MAX_CLIENT_ID: u8 = 0x0F;

/// Varints are at most 4 bytes (28 bits of payload).
const MAX_VARINT_LEN: usize = 4;
const MAX_VARINT_VALUE: u32 = (1 << (7 * MAX_VARINT_LEN)) - 1;

const CLIENT_MASK: u8 = 0x0F;
const FLAGS_MASK: u8 = 0xF0;

bitflags::bitflags! {
    /// Header flag bits (high nibble of the second header byte).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandFlags: u8 {
        /// The receiver must send an acknowledgement.
        const NEEDS_ACKNOWLEDGEMENT = 0x10;
        /// The command id is a system command rather than a device command.
        const SYSTEM_COMMAND = 0x20;
        /// First packet of a chunk sequence; the chunk index holds the total size.
        const CHUNK_START = 0x40;
        /// Part of a chunk sequence; a chunk index follows the length.
        const CHUNK_PACKET = 0x80;
    }
}

/// The command header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub command_id: u8,
    pub client_id: u8,
    pub flags: CommandFlags,
    /// Per-command sequence count. Zero means "no sequence" and is never sent.
    pub sequence: u8,
    /// Offset of this chunk in the reassembled payload, or the total payload
    /// size on a chunk start packet. Only meaningful on chunked packets.
    pub chunk_index: u32,
    /// Number of payload bytes carried by this packet.
    pub data_length: usize,
}

impl CommandHeader {
    /// Create a header for client 0 with no sequence and no payload.
    pub fn new(command_id: u8, flags: CommandFlags) -> Self {
        Self {
            command_id,
            client_id: 0,
            flags,
            sequence: 0,
            chunk_index: 0,
            data_length: 0,
        }
    }

    pub fn is_system(&self) -> bool {
        self.flags.contains(CommandFlags::SYSTEM_COMMAND)
    }

    pub fn is_chunked(&self) -> bool {
        self.flags.contains(CommandFlags::CHUNK_PACKET)
    }

    pub fn needs_acknowledgement(&self) -> bool {
        self.flags.contains(CommandFlags::NEEDS_ACKNOWLEDGEMENT)
    }

    /// Number of bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        let mut len = 3 + varint_len(self.data_length as u32);
        if self.is_chunked() {
            len += varint_len(self.chunk_index);
        }
        len
    }
}

/// Encode a header into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬──────────┬──────────────┬───────────────────┐
/// │ Command  │ Flags|Client │ Sequence │ Length       │ Chunk index       │
/// │ (1B)     │ (4b | 4b)    │ (1B)     │ (varint)     │ (varint, chunked) │
/// └──────────┴──────────────┴──────────┴──────────────┴───────────────────┘
/// ```
pub fn encode_header(header: &CommandHeader, dst: &mut BytesMut) -> Result<()> {
    if header.client_id > MAX_CLIENT_ID {
        return Err(FrameError::InvalidClientId(header.client_id));
    }
    let data_length = u32::try_from(header.data_length)
        .ok()
        .filter(|len| *len <= MAX_VARINT_VALUE)
        .ok_or(FrameError::InvalidVarint)?;

    dst.reserve(header.encoded_len());
    dst.put_u8(header.command_id);
    dst.put_u8((header.flags.bits() & FLAGS_MASK) | (header.client_id & CLIENT_MASK));
    dst.put_u8(header.sequence);
    put_varint(data_length, dst)?;
    if header.is_chunked() {
        put_varint(header.chunk_index, dst)?;
    }
    Ok(())
}

/// Encode a header followed by its payload.
///
/// The header's `data_length` must describe `data` exactly.
pub fn encode_packet(header: &CommandHeader, data: &[u8], dst: &mut BytesMut) -> Result<()> {
    if header.data_length != data.len() {
        return Err(FrameError::LengthMismatch {
            declared: header.data_length,
            actual: data.len(),
        });
    }
    encode_header(header, dst)?;
    dst.put_slice(data);
    Ok(())
}

/// Decode a header from the start of `src`.
///
/// Returns the header and the number of bytes it occupied.
pub fn decode_header(src: &[u8]) -> Result<(CommandHeader, usize)> {
    if src.len() < MIN_HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: MIN_HEADER_SIZE,
            actual: src.len(),
        });
    }

    let flags = CommandFlags::from_bits_truncate(src[1] & FLAGS_MASK);
    let mut pos = 3;
    let data_length = read_varint(src, &mut pos)? as usize;
    let chunk_index = if flags.contains(CommandFlags::CHUNK_PACKET) {
        read_varint(src, &mut pos)?
    } else {
        0
    };

    let header = CommandHeader {
        command_id: src[0],
        client_id: src[1] & CLIENT_MASK,
        flags,
        sequence: src[2],
        chunk_index,
        data_length,
    };
    Ok((header, pos))
}

/// Split one raw packet into its header and payload.
///
/// Fails if the payload length differs from the header's declared length.
pub fn decode_packet(src: &[u8]) -> Result<(CommandHeader, &[u8])> {
    let (header, consumed) = decode_header(src)?;
    let payload = &src[consumed..];
    if payload.len() != header.data_length {
        return Err(FrameError::LengthMismatch {
            declared: header.data_length,
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

fn read_varint(src: &[u8], pos: &mut usize) -> Result<u32> {
    let mut value = 0u32;
    for shift in 0..MAX_VARINT_LEN {
        let Some(&byte) = src.get(*pos) else {
            return Err(FrameError::Truncated {
                needed: *pos + 1,
                actual: src.len(),
            });
        };
        *pos += 1;

        value |= u32::from(byte & 0x7F) << (7 * shift);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(FrameError::InvalidVarint)
}

fn put_varint(mut value: u32, dst: &mut BytesMut) -> Result<()> {
    if value > MAX_VARINT_VALUE {
        return Err(FrameError::InvalidVarint);
    }
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            dst.put_u8(byte);
            return Ok(());
        }
        dst.put_u8(byte | 0x80);
    }
}

fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let header = CommandHeader {
            command_id: 0x20,
            client_id: 1,
            flags: CommandFlags::empty(),
            sequence: 7,
            chunk_index: 0,
            data_length: 3,
        };
        let mut buf = BytesMut::new();
        encode_packet(&header, &[0xAA, 0xBB, 0xCC], &mut buf).unwrap();

        assert_eq!(buf.as_ref(), &[0x20, 0x01, 0x07, 0x03, 0xAA, 0xBB, 0xCC]);

        let (decoded, payload) = decode_packet(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_decode_power_on_packet() {
        let (header, payload) = decode_packet(&[0x05, 0x20, 0x01, 0x01, 0x00]).unwrap();
        assert_eq!(header.command_id, 0x05);
        assert!(header.is_system());
        assert!(!header.needs_acknowledgement());
        assert_eq!(header.client_id, 0);
        assert_eq!(header.sequence, 1);
        assert_eq!(payload, &[0x00]);
    }

    #[test]
    fn test_chunked_header_carries_index() {
        let header = CommandHeader {
            command_id: 0x04,
            client_id: 0,
            flags: CommandFlags::SYSTEM_COMMAND
                | CommandFlags::CHUNK_PACKET
                | CommandFlags::CHUNK_START
                | CommandFlags::NEEDS_ACKNOWLEDGEMENT,
            sequence: 2,
            chunk_index: 0x01C2,
            data_length: 0x3A,
        };
        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf).unwrap();

        assert_eq!(buf.as_ref(), &[0x04, 0xF0, 0x02, 0x3A, 0xC2, 0x03]);
        assert_eq!(header.encoded_len(), buf.len());

        let (decoded, consumed) = decode_header(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_multi_byte_length() {
        let header = CommandHeader {
            data_length: 300,
            ..CommandHeader::new(0x20, CommandFlags::empty())
        };
        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf).unwrap();
        assert_eq!(&buf[3..], &[0xAC, 0x02]);

        let (decoded, _) = decode_header(&buf).unwrap();
        assert_eq!(decoded.data_length, 300);
    }

    #[test]
    fn test_decode_truncated_header() {
        let result = decode_header(&[0x20, 0x00, 0x01]);
        assert!(matches!(
            result,
            Err(FrameError::Truncated {
                needed: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_decode_truncated_chunk_index() {
        let result = decode_header(&[0x04, 0xA0, 0x01, 0x10]);
        assert!(matches!(result, Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn test_decode_unterminated_varint() {
        let result = decode_header(&[0x20, 0x00, 0x01, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(matches!(result, Err(FrameError::InvalidVarint)));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let result = decode_packet(&[0x20, 0x00, 0x01, 0x05, 0x00]);
        assert!(matches!(
            result,
            Err(FrameError::LengthMismatch {
                declared: 5,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_encode_rejects_wide_client_id() {
        let header = CommandHeader {
            client_id: 0x10,
            ..CommandHeader::new(0x20, CommandFlags::empty())
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_header(&header, &mut buf),
            Err(FrameError::InvalidClientId(0x10))
        ));
    }

    #[test]
    fn test_encode_rejects_length_mismatch() {
        let header = CommandHeader {
            data_length: 2,
            ..CommandHeader::new(0x20, CommandFlags::empty())
        };
        let mut buf = BytesMut::new();
        assert!(matches!(
            encode_packet(&header, &[1], &mut buf),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_flags_and_client_share_byte() {
        let (header, _) = decode_header(&[0x20, 0x33, 0x01, 0x00]).unwrap();
        assert_eq!(header.client_id, 3);
        assert_eq!(
            header.flags,
            CommandFlags::NEEDS_ACKNOWLEDGEMENT | CommandFlags::SYSTEM_COMMAND
        );
    }
}
