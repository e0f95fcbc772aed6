//! Bridge for GIP (Xbox One family) instrument controllers.
//!
//! gipbridge speaks the device side of the GIP protocol: it decodes packets,
//! reassembles chunked messages, negotiates each client's descriptor and maps
//! instrument input onto virtual controllers.
//!
//! # Crate Structure
//!
//! - [`transport`]: packet sinks and the transport's send policy
//! - [`frame`]: command header codec, protocol messages, chunking and packet logs
//! - [`mapper`]: device mappers and the virtual controller model
//! - [`session`]: per-client protocol state machine and device routing

/// Re-export transport types.
pub mod transport {
    pub use gipbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use gipbridge_frame::*;
}

/// Re-export mapper types.
pub mod mapper {
    pub use gipbridge_mapper::*;
}

/// Re-export session types.
pub mod session {
    pub use gipbridge_session::*;
}
