use bytes::Bytes;
use tracing::debug;

use crate::codec::{CommandFlags, CommandHeader};
use crate::command;
use crate::error::{FrameError, Result};

/// Largest payload a chunk sequence may announce.
///
/// Acknowledgements report progress in 16-bit fields, so nothing larger can
/// be paced by the sender anyway.
pub const MAX_CHUNKED_PAYLOAD: usize = u16::MAX as usize;

/// What a chunk did to its reassembly buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkProgress {
    /// A zero-offset chunk. Nothing was buffered; the packet is passed on as-is.
    Empty,
    /// The chunk was buffered; more are expected.
    Pending,
    /// The sequence finished. The header now describes the whole payload.
    Complete(Bytes),
}

/// Reassembly buffer for one command id's chunk sequence.
///
/// The chunk start packet's index holds the total payload size; every later
/// chunk's index is its byte offset, which must equal the number of bytes
/// buffered so far. An empty chunk at the end offset terminates the sequence.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    buffer: Option<Vec<u8>>,
    bytes_used: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sequence is in progress.
    pub fn is_active(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn bytes_remaining(&self) -> usize {
        self.capacity() - self.bytes_used
    }

    /// Total size of the payload being reassembled (0 when idle).
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, Vec::len)
    }

    /// Feed one chunk.
    ///
    /// On error the buffer is left exactly as it was, so the caller may
    /// decide whether to wait for a retransmission or give up.
    pub fn process_chunk(&mut self, header: &mut CommandHeader, data: &[u8]) -> Result<ChunkProgress> {
        let mut offset = header.chunk_index as usize;

        // Zero-length chunk sequences are valid and have been seen in the wild.
        if offset == 0 {
            return Ok(ChunkProgress::Empty);
        }

        if self.buffer.is_none() || header.flags.contains(CommandFlags::CHUNK_START) {
            if !header.flags.contains(CommandFlags::CHUNK_START) {
                // Some devices send stray authentication chunks mid-handshake.
                if header.command_id == command::AUTHENTICATION {
                    debug!(offset, "ignoring authentication chunk without a sequence start");
                    return Ok(ChunkProgress::Pending);
                }
                return Err(FrameError::OrphanChunk {
                    command: header.command_id,
                });
            }

            if offset > MAX_CHUNKED_PAYLOAD {
                return Err(FrameError::ChunkOverflow {
                    offset: 0,
                    len: offset,
                    capacity: MAX_CHUNKED_PAYLOAD,
                });
            }

            self.buffer = Some(vec![0; offset]);
            self.bytes_used = 0;
            offset = 0;
        }

        if offset != self.bytes_used {
            return Err(FrameError::MisalignedChunk {
                offset,
                expected: self.bytes_used,
            });
        }

        let capacity = self.capacity();
        if offset >= capacity {
            if !data.is_empty() {
                return Err(FrameError::TrailingChunkData(data.len()));
            }

            let payload = self.buffer.take().unwrap_or_default();
            self.bytes_used = 0;

            header.data_length = payload.len();
            header
                .flags
                .remove(CommandFlags::CHUNK_PACKET | CommandFlags::CHUNK_START);
            header.chunk_index = 0;
            return Ok(ChunkProgress::Complete(Bytes::from(payload)));
        }

        if offset + data.len() > capacity {
            return Err(FrameError::ChunkOverflow {
                offset,
                len: data.len(),
                capacity,
            });
        }

        if let Some(buffer) = self.buffer.as_mut() {
            buffer[offset..offset + data.len()].copy_from_slice(data);
        }
        self.bytes_used = offset + data.len();
        Ok(ChunkProgress::Pending)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn chunk_header(command_id: u8, index: usize, len: usize, start: bool) -> CommandHeader {
        let mut flags = CommandFlags::SYSTEM_COMMAND | CommandFlags::CHUNK_PACKET;
        if start {
            flags |= CommandFlags::CHUNK_START;
        }
        CommandHeader {
            command_id,
            client_id: 0,
            flags,
            sequence: 1,
            chunk_index: index as u32,
            data_length: len,
        }
    }

    /// Feed `payload` split at `cuts`, returning every progress value.
    fn feed(buffer: &mut ChunkBuffer, payload: &[u8], cuts: &[usize]) -> Vec<ChunkProgress> {
        let mut progress = Vec::new();
        let mut start = 0;
        let mut bounds = cuts.to_vec();
        bounds.push(payload.len());

        for (i, end) in bounds.into_iter().enumerate() {
            let piece = &payload[start..end];
            let index = if i == 0 { payload.len() } else { start };
            let mut header = chunk_header(command::DESCRIPTOR, index, piece.len(), i == 0);
            progress.push(buffer.process_chunk(&mut header, piece).unwrap());
            start = end;
        }

        let mut last = chunk_header(command::DESCRIPTOR, payload.len(), 0, false);
        progress.push(buffer.process_chunk(&mut last, &[]).unwrap());
        assert!(!last.is_chunked());
        assert_eq!(last.data_length, payload.len());
        progress
    }

    #[test]
    fn three_chunks_reassemble() {
        let payload: Vec<u8> = (0..40u8).collect();
        let mut buffer = ChunkBuffer::new();

        let progress = feed(&mut buffer, &payload, &[10, 25]);

        assert!(progress[..3].iter().all(|p| *p == ChunkProgress::Pending));
        assert_eq!(progress[3], ChunkProgress::Complete(Bytes::from(payload)));
        assert!(!buffer.is_active());
    }

    #[test]
    fn misaligned_chunk_leaves_buffer_untouched() {
        let mut buffer = ChunkBuffer::new();
        let mut start = chunk_header(command::DESCRIPTOR, 8, 4, true);
        buffer.process_chunk(&mut start, &[1, 2, 3, 4]).unwrap();

        let mut skipped = chunk_header(command::DESCRIPTOR, 6, 2, false);
        let err = buffer.process_chunk(&mut skipped, &[7, 8]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::MisalignedChunk {
                offset: 6,
                expected: 4
            }
        ));
        assert_eq!(buffer.bytes_used(), 4);
        assert_eq!(buffer.bytes_remaining(), 4);

        let mut next = chunk_header(command::DESCRIPTOR, 4, 4, false);
        assert_eq!(
            buffer.process_chunk(&mut next, &[5, 6, 7, 8]).unwrap(),
            ChunkProgress::Pending
        );
        let mut end = chunk_header(command::DESCRIPTOR, 8, 0, false);
        assert_eq!(
            buffer.process_chunk(&mut end, &[]).unwrap(),
            ChunkProgress::Complete(Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8]))
        );
    }

    #[test]
    fn zero_index_is_a_no_op() {
        let mut buffer = ChunkBuffer::new();
        let mut header = chunk_header(command::DESCRIPTOR, 0, 0, false);
        assert_eq!(
            buffer.process_chunk(&mut header, &[]).unwrap(),
            ChunkProgress::Empty
        );
        assert!(!buffer.is_active());
    }

    #[test]
    fn chunk_without_start_is_rejected() {
        let mut buffer = ChunkBuffer::new();
        let mut header = chunk_header(command::DESCRIPTOR, 4, 2, false);
        assert!(matches!(
            buffer.process_chunk(&mut header, &[1, 2]),
            Err(FrameError::OrphanChunk { command: 0x04 })
        ));
    }

    #[test]
    fn authentication_chunk_without_start_is_tolerated() {
        let mut buffer = ChunkBuffer::new();
        let mut header = chunk_header(command::AUTHENTICATION, 4, 2, false);
        assert_eq!(
            buffer.process_chunk(&mut header, &[1, 2]).unwrap(),
            ChunkProgress::Pending
        );
        assert!(!buffer.is_active());
    }

    #[test]
    fn terminal_chunk_with_data_is_rejected() {
        let mut buffer = ChunkBuffer::new();
        let mut start = chunk_header(command::DESCRIPTOR, 2, 2, true);
        buffer.process_chunk(&mut start, &[1, 2]).unwrap();

        let mut end = chunk_header(command::DESCRIPTOR, 2, 1, false);
        assert!(matches!(
            buffer.process_chunk(&mut end, &[3]),
            Err(FrameError::TrailingChunkData(1))
        ));
        assert!(buffer.is_active());
    }

    #[test]
    fn chunk_past_end_is_rejected() {
        let mut buffer = ChunkBuffer::new();
        let mut start = chunk_header(command::DESCRIPTOR, 4, 3, true);
        buffer.process_chunk(&mut start, &[1, 2, 3]).unwrap();

        let mut next = chunk_header(command::DESCRIPTOR, 3, 2, false);
        assert!(matches!(
            buffer.process_chunk(&mut next, &[4, 5]),
            Err(FrameError::ChunkOverflow { .. })
        ));
        assert_eq!(buffer.bytes_used(), 3);
    }

    #[test]
    fn oversized_sequence_is_rejected() {
        let mut buffer = ChunkBuffer::new();
        let mut start = chunk_header(command::DESCRIPTOR, MAX_CHUNKED_PAYLOAD + 1, 0, true);
        assert!(matches!(
            buffer.process_chunk(&mut start, &[]),
            Err(FrameError::ChunkOverflow { .. })
        ));
        assert!(!buffer.is_active());
    }

    #[test]
    fn new_start_discards_previous_sequence() {
        let mut buffer = ChunkBuffer::new();
        let mut first = chunk_header(command::DESCRIPTOR, 6, 3, true);
        buffer.process_chunk(&mut first, &[1, 1, 1]).unwrap();

        let mut restart = chunk_header(command::DESCRIPTOR, 2, 2, true);
        buffer.process_chunk(&mut restart, &[9, 9]).unwrap();
        let mut end = chunk_header(command::DESCRIPTOR, 2, 0, false);
        assert_eq!(
            buffer.process_chunk(&mut end, &[]).unwrap(),
            ChunkProgress::Complete(Bytes::from_static(&[9, 9]))
        );
    }

    proptest! {
        #[test]
        fn any_ordered_split_reassembles(
            payload in proptest::collection::vec(any::<u8>(), 3..512),
            a in 1usize..1000,
            b in 1usize..1000,
        ) {
            let len = payload.len();
            let mut cuts = vec![a % (len - 1) + 1, b % (len - 1) + 1];
            cuts.sort_unstable();
            cuts.dedup();

            let mut buffer = ChunkBuffer::new();
            let progress = feed(&mut buffer, &payload, &cuts);
            let (last, rest) = progress.split_last().unwrap();

            prop_assert!(rest.iter().all(|p| *p == ChunkProgress::Pending));
            prop_assert_eq!(last, &ChunkProgress::Complete(Bytes::from(payload.clone())));
        }
    }
}
