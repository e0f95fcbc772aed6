use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::PacketSink;

/// Number of attempts made for each outbound packet before giving up.
pub const DEFAULT_SEND_ATTEMPTS: u32 = 3;

/// Bounded retry policy for outbound packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_SEND_ATTEMPTS,
        }
    }
}

/// Send one packet, retrying transient failures up to the policy's budget.
///
/// Every failed write, interrupted ones included, consumes an attempt. Once the
/// budget is spent the last error is returned as
/// [`TransportError::RetriesExhausted`]; callers treat that as a disconnect.
pub fn send_with_retry<S: PacketSink + ?Sized>(
    sink: &mut S,
    packet: &[u8],
    policy: RetryPolicy,
) -> Result<()> {
    let max = sink.max_packet_size();
    if packet.len() > max {
        return Err(TransportError::PacketTooLarge {
            size: packet.len(),
            max,
        });
    }

    let attempts = policy.attempts.max(1);
    let mut attempt = 0u32;
    loop {
        match sink.send_packet(packet) {
            Ok(()) => return Ok(()),
            Err(err) => {
                attempt += 1;
                debug!(attempt, error = %err, "packet send failed");
                if attempt >= attempts {
                    return Err(TransportError::RetriesExhausted {
                        attempts,
                        last: err,
                    });
                }
            }
        }
    }
}
