//! Protocol session engine for the GIP instrument bridge.
//!
//! A [`DeviceRouter`] owns one physical device: it decodes inbound packets,
//! creates a [`ClientSession`] per client id and sends replies through its
//! [`DeviceLink`]. Each session reassembles chunked messages, acknowledges,
//! drops retransmissions, negotiates the device's descriptor and drives the
//! client's mapper. [`Capture`] multiplexes many devices and stops everything
//! when one of them faults.

pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod link;
pub mod session;

pub use capture::Capture;
pub use config::{SessionConfig, DEFAULT_DESCRIPTOR_FAILURE_LIMIT};
pub use device::{DeviceRouter, PRIMARY_CLIENT};
pub use error::{CaptureError, Result, SessionError};
pub use link::{DeviceLink, PACKET_LOG_TARGET};
pub use session::ClientSession;
