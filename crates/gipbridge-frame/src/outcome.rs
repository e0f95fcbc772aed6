use std::fmt;

/// Result of handling one protocol message.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The message was handled (or was a harmless duplicate).
    Success,
    /// A chunked message is still being reassembled.
    Pending,
    /// The message was malformed and has been dropped.
    InvalidMessage,
    /// The device cannot be mapped; the caller should disconnect it.
    UnsupportedDevice,
    /// The device went away; the caller should tear it down.
    Disconnected,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    /// Whether the owning client or device must be torn down.
    pub fn is_fatal(self) -> bool {
        matches!(self, Outcome::UnsupportedDevice | Outcome::Disconnected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Pending => "pending",
            Outcome::InvalidMessage => "invalid-message",
            Outcome::UnsupportedDevice => "unsupported-device",
            Outcome::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
