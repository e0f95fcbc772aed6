use std::io;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

/// The physical path a device is reached through.
///
/// Each transport has its own policy quirks; the protocol engine asks the
/// transport kind instead of hard-coding them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Direct USB access to the device's interrupt pipes.
    Usb,
    /// The platform vendor input API (raw reports only, no system commands).
    VendorInput,
    /// Passive capture of wireless traffic from a receiver dongle.
    Capture,
    /// Offline replay of a packet log.
    Replay,
}

impl TransportKind {
    /// Whether the guide button may be forwarded to virtual controllers.
    ///
    /// Only direct USB access keeps the OS from acting on the guide button
    /// itself; on every other transport forwarding it would trigger the
    /// button twice.
    pub fn maps_guide_button(self) -> bool {
        matches!(self, TransportKind::Usb)
    }

    /// Transport name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Usb => "usb",
            TransportKind::VendorInput => "vendor-input",
            TransportKind::Capture => "capture",
            TransportKind::Replay => "replay",
        }
    }
}

/// The write half of a device transport.
///
/// One call writes exactly one packet. Implementations report failures as
/// plain I/O errors; retrying is handled by [`crate::send_with_retry`].
pub trait PacketSink {
    /// Write a single packet to the device.
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()>;

    /// Largest packet this sink can carry in one transfer.
    fn max_packet_size(&self) -> usize {
        64
    }
}

impl<T: PacketSink + ?Sized> PacketSink for Box<T> {
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        (**self).send_packet(packet)
    }

    fn max_packet_size(&self) -> usize {
        (**self).max_packet_size()
    }
}

/// A sink that accepts and discards every packet.
///
/// Used by transports which cannot talk back to the device (capture, replay).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PacketSink for NullSink {
    fn send_packet(&mut self, _packet: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// A sink that records every packet written to it.
///
/// Clones share the same history, so a test can keep one handle while the
/// device owns another.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    history: Arc<Mutex<Vec<Bytes>>>,
    failures: Arc<Mutex<u32>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends fail with a broken-pipe error.
    pub fn fail_next(&self, count: u32) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        *failures = count;
    }

    /// Every packet written so far, oldest first.
    pub fn packets(&self) -> Vec<Bytes> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.clone()
    }

    /// Forget all recorded packets.
    pub fn clear(&self) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.clear();
    }
}

impl PacketSink for RecordingSink {
    fn send_packet(&mut self, packet: &[u8]) -> io::Result<()> {
        {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            if *failures > 0 {
                *failures -= 1;
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
        }

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push(Bytes::copy_from_slice(packet));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_button_policy_per_transport() {
        assert!(TransportKind::Usb.maps_guide_button());
        assert!(!TransportKind::VendorInput.maps_guide_button());
        assert!(!TransportKind::Capture.maps_guide_button());
        assert!(!TransportKind::Replay.maps_guide_button());
    }

    #[test]
    fn recording_sink_shares_history_between_clones() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();

        writer.send_packet(&[1, 2, 3]).unwrap();
        writer.send_packet(&[4]).unwrap();

        let packets = sink.packets();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].as_ref(), &[1, 2, 3]);
        assert_eq!(packets[1].as_ref(), &[4]);
    }

    #[test]
    fn recording_sink_injected_failures() {
        let mut sink = RecordingSink::new();
        sink.fail_next(1);

        let err = sink.send_packet(&[9]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        sink.send_packet(&[9]).unwrap();
        assert_eq!(sink.packets().len(), 1);
    }

    #[test]
    fn null_sink_accepts_everything() {
        let mut sink = NullSink;
        assert!(sink.send_packet(&[0u8; 128]).is_ok());
    }
}
