//! Async packet log streaming over `tokio_util::codec`.
//!
//! Library API for consumers that read captures from async sources such as
//! sockets or child process pipes. The `gipbridge replay` command reads files
//! and stdin synchronously through [`crate::log::parse_packet`] instead.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::FrameError;
use crate::log::{parse_packet, strip_comment, LoggedPacket};

/// Longest log line accepted; a full 64 KiB payload in hex fits comfortably.
pub const MAX_LOG_LINE: usize = 256 * 1024;

/// Line codec yielding one [`LoggedPacket`] per non-empty, non-comment line.
#[derive(Debug)]
pub struct PacketLogCodec {
    lines: LinesCodec,
}

impl PacketLogCodec {
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LOG_LINE),
        }
    }
}

impl Default for PacketLogCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn map_lines_error(err: LinesCodecError) -> FrameError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            FrameError::InvalidLogLine(format!("line longer than {MAX_LOG_LINE} bytes"))
        }
        LinesCodecError::Io(err) => FrameError::Io(err),
    }
}

impl Decoder for PacketLogCodec {
    type Item = LoggedPacket;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode(src).map_err(map_lines_error)? {
            let line = strip_comment(&line);
            if !line.is_empty() {
                return parse_packet(line).map(Some);
            }
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode_eof(src).map_err(map_lines_error)? {
            let line = strip_comment(&line);
            if !line.is_empty() {
                return parse_packet(line).map(Some);
            }
        }
        Ok(None)
    }
}

impl Encoder<LoggedPacket> for PacketLogCodec {
    type Error = FrameError;

    fn encode(&mut self, item: LoggedPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.lines
            .encode(item.to_line(), dst)
            .map_err(map_lines_error)
    }
}
