//! Packet transport abstraction for GIP devices.
//!
//! Physical transports (USB bulk pipes, vendor input APIs, wireless capture,
//! packet-log replay) differ wildly in how they move bytes. The protocol engine
//! only needs a way to write one outbound packet and to know a few policy bits
//! about where the packet is going. That is what this crate provides:
//! - [`PacketSink`], the write half of a transport
//! - [`TransportKind`], which carries per-transport policy
//! - [`RetryPolicy`] and [`send_with_retry`] for bounded retransmission

pub mod error;
pub mod retry;
pub mod traits;

pub use error::{Result, TransportError};
pub use retry::{send_with_retry, RetryPolicy, DEFAULT_SEND_ATTEMPTS};
pub use traits::{NullSink, PacketSink, RecordingSink, TransportKind};
