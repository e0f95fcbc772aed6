//! Wire layer of the GIP instrument bridge.
//!
//! Every packet exchanged with a device starts with a small command header:
//! - 1 byte command id
//! - 1 byte of flags (high nibble) and client id (low nibble)
//! - 1 byte sequence count
//! - a LEB128 varint payload length
//! - a LEB128 varint chunk index, only on chunked packets
//!
//! This crate decodes and encodes that header, parses the system messages the
//! session engine negotiates with, reassembles chunked payloads, and reads and
//! writes the textual packet log used for diagnostics and replay.

pub mod chunk;
pub mod codec;
pub mod command;
pub mod descriptor;
pub mod error;
pub mod log;
pub mod message;
pub mod outcome;

#[cfg(feature = "async")]
pub mod log_codec;

pub use chunk::{ChunkBuffer, ChunkProgress};
pub use codec::{
    decode_header, decode_packet, encode_header, encode_packet, CommandFlags, CommandHeader,
    MAX_CLIENT_ID, MIN_HEADER_SIZE,
};
pub use descriptor::Descriptor;
pub use error::{FrameError, Result};
pub use log::{
    format_packet, format_packet_at, parse_packet, strip_comment, Direction, LoggedPacket,
};
pub use message::{
    next_sequence, Acknowledgement, Arrival, Keystroke, Message, Status, GUIDE_KEY_CODE,
    KEYSTROKE_SIZE,
};
pub use outcome::Outcome;

#[cfg(feature = "async")]
pub use log_codec::PacketLogCodec;
