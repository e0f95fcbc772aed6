/// Errors that can occur in packet transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The packet does not fit in a single transfer on this transport.
    #[error("packet too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// Every send attempt failed; the device is considered gone.
    #[error("send failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
