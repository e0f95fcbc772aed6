/// Errors that can occur while routing packets to client sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A packet could not be decoded.
    #[error("frame error: {0}")]
    Frame(#[from] gipbridge_frame::FrameError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that end a capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Processing a packet failed in a way that suggests the stream is out of
    /// sync. The capture has been stopped.
    #[error("device {device_id} faulted, capture stopped: {source}")]
    Fault {
        device_id: u64,
        #[source]
        source: SessionError,
    },

    /// The capture was stopped and accepts no more packets.
    #[error("capture is stopped")]
    Stopped,
}
