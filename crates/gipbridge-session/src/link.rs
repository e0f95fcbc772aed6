//! Outbound path shared by every client on one device.

use bytes::BytesMut;
use gipbridge_frame::{format_packet, Direction, Message, Outcome};
use gipbridge_transport::{send_with_retry, PacketSink, RetryPolicy, TransportError, TransportKind};
use tracing::{debug, error, warn};

use crate::config::SessionConfig;

/// Tracing target for packet logs.
pub const PACKET_LOG_TARGET: &str = "gipbridge::packets";

/// A device's packet sink plus the device-wide state sessions consult.
///
/// Once a send exhausts its retries the link stays disconnected and every
/// later send reports [`Outcome::Disconnected`] without touching the sink.
#[derive(Debug)]
pub struct DeviceLink<S> {
    sink: S,
    kind: TransportKind,
    retry: RetryPolicy,
    log_packets: bool,
    inputs_enabled: bool,
    disconnected: bool,
    scratch: BytesMut,
}

impl<S: PacketSink> DeviceLink<S> {
    pub fn new(sink: S, kind: TransportKind, config: &SessionConfig) -> Self {
        Self {
            sink,
            kind,
            retry: config.retry,
            log_packets: config.log_packets,
            inputs_enabled: config.inputs_enabled,
            disconnected: false,
            scratch: BytesMut::with_capacity(64),
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn inputs_enabled(&self) -> bool {
        self.inputs_enabled
    }

    pub(crate) fn set_inputs_enabled(&mut self, enabled: bool) {
        self.inputs_enabled = enabled;
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Encode and send one fully set up message.
    pub fn send(&mut self, message: &Message) -> Outcome {
        if self.disconnected {
            return Outcome::Disconnected;
        }

        self.scratch.clear();
        if let Err(err) = message.encode(&mut self.scratch) {
            warn!(command = message.header.command_id, error = %err, "failed to encode outbound message");
            return Outcome::InvalidMessage;
        }

        let header_len = self.scratch.len() - message.data.len();
        self.log_packet(&self.scratch[..header_len], &message.data, Direction::Out);

        match send_with_retry(&mut self.sink, &self.scratch, self.retry) {
            Ok(()) => Outcome::Success,
            Err(TransportError::PacketTooLarge { size, max }) => {
                warn!(
                    command = message.header.command_id,
                    size, max, "outbound message does not fit in one packet"
                );
                Outcome::InvalidMessage
            }
            Err(err) => {
                error!(transport = self.kind.name(), error = %err, "device stopped responding");
                self.disconnected = true;
                Outcome::Disconnected
            }
        }
    }

    /// Log one packet if packet logging is on.
    pub fn log_packet(&self, header: &[u8], data: &[u8], direction: Direction) {
        if self.log_packets {
            debug!(target: PACKET_LOG_TARGET, "{}", format_packet(header, data, direction));
        }
    }
}
