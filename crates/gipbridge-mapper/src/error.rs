use crate::backend::MappingMode;

/// Errors that can occur while creating or driving a virtual controller.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// The backend has no free device slots.
    #[error("no {mode} devices available")]
    CapacityExhausted { mode: MappingMode },

    /// The backend refused to create or update a device.
    #[error("{mode} backend error: {message}")]
    Backend { mode: MappingMode, message: String },

    /// A mapping mode name was not recognised.
    #[error("unknown mapping mode '{0}' (expected vigem, vjoy or rpcs3)")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T, MapperError>;
