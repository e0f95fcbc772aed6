/// Errors that can occur while decoding or encoding protocol data.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The input ended before a complete structure could be read.
    #[error("truncated input ({actual} bytes, need {needed})")]
    Truncated { needed: usize, actual: usize },

    /// A length varint did not terminate within its maximum width.
    #[error("invalid varint in command header")]
    InvalidVarint,

    /// The client id does not fit in the header's low nibble.
    #[error("client id {0} out of range (max 15)")]
    InvalidClientId(u8),

    /// The declared payload length does not match the bytes carried.
    #[error("payload length mismatch (header says {declared}, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// A fixed-layout payload has the wrong size for its command.
    #[error("malformed payload for command {command:#04x} ({len} bytes)")]
    MalformedPayload { command: u8, len: usize },

    /// A chunk arrived with no chunk sequence in progress.
    #[error("chunk for command {command:#04x} without a chunk sequence start")]
    OrphanChunk { command: u8 },

    /// A chunk's offset does not continue where the previous chunk ended.
    #[error("misaligned chunk (offset {offset}, expected {expected})")]
    MisalignedChunk { offset: usize, expected: usize },

    /// A chunk would write past the end of the reassembly buffer.
    #[error("chunk overflows buffer (offset {offset} + {len} bytes, buffer {capacity})")]
    ChunkOverflow {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// The terminating chunk carried payload bytes.
    #[error("terminal chunk carries {0} unexpected bytes")]
    TrailingChunkData(usize),

    /// The device descriptor is malformed.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// A packet log line could not be parsed.
    #[error("invalid packet log line: {0}")]
    InvalidLogLine(String),

    /// An I/O error occurred while streaming packet logs.
    #[error("packet log I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
