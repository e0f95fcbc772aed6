//! One physical device: its client sessions and shared outbound link.

use std::collections::BTreeMap;

use gipbridge_frame::{decode_header, CommandHeader, Direction, Message, Outcome};
use gipbridge_mapper::MapperFactory;
use gipbridge_transport::{PacketSink, TransportKind};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::link::DeviceLink;
use crate::session::ClientSession;

/// Client id of the device itself; losing it loses the device.
pub const PRIMARY_CLIENT: u8 = 0;

/// Routes a device's inbound packets to per-client sessions.
///
/// Every outcome returned from [`DeviceRouter::handle_packet`] is device-wide:
/// a fatal one means the caller should tear the device down. Fatal outcomes
/// from secondary clients only remove that client.
#[derive(Debug)]
pub struct DeviceRouter<S: PacketSink> {
    clients: BTreeMap<u8, ClientSession>,
    link: DeviceLink<S>,
    factory: MapperFactory,
    config: SessionConfig,
}

impl<S: PacketSink> DeviceRouter<S> {
    pub fn new(sink: S, kind: TransportKind, factory: MapperFactory) -> Self {
        Self::with_config(sink, kind, factory, SessionConfig::default())
    }

    pub fn with_config(
        sink: S,
        kind: TransportKind,
        factory: MapperFactory,
        config: SessionConfig,
    ) -> Self {
        Self {
            clients: BTreeMap::new(),
            link: DeviceLink::new(sink, kind, &config),
            factory,
            config,
        }
    }

    pub fn link(&self) -> &DeviceLink<S> {
        &self.link
    }

    pub fn client(&self, client_id: u8) -> Option<&ClientSession> {
        self.clients.get(&client_id)
    }

    pub fn clients(&self) -> impl Iterator<Item = &ClientSession> {
        self.clients.values()
    }

    pub fn inputs_enabled(&self) -> bool {
        self.link.inputs_enabled()
    }

    /// Decode and handle one raw inbound packet.
    ///
    /// Errors only when the header itself cannot be decoded.
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<Outcome> {
        let (header, consumed) = decode_header(packet)?;
        let payload = &packet[consumed..];
        self.link.log_packet(&packet[..consumed], payload, Direction::In);
        Ok(self.handle_message(header, payload))
    }

    /// Handle one decoded inbound message.
    pub fn handle_message(&mut self, header: CommandHeader, payload: &[u8]) -> Outcome {
        let client_id = header.client_id;
        let session = self.clients.entry(client_id).or_insert_with(|| {
            debug!(client = client_id, "new client");
            ClientSession::new(client_id, self.factory.clone(), &self.config)
        });

        let outcome = session.handle_message(header, payload, &mut self.link);
        if !outcome.is_fatal() {
            return outcome;
        }

        if outcome == Outcome::UnsupportedDevice {
            if session.send(&mut self.link, Message::power_off()) != Outcome::Success {
                warn!(client = client_id, "failed to power off unsupported client");
            }
        }

        if client_id == PRIMARY_CLIENT || self.link.is_disconnected() {
            return outcome;
        }

        self.clients.remove(&client_id);
        info!(client = client_id, %outcome, "removed client");
        Outcome::Success
    }

    /// Enable or disable input mapping for every client.
    pub fn enable_inputs(&mut self, enabled: bool) {
        self.link.set_inputs_enabled(enabled);
        for session in self.clients.values_mut() {
            session.enable_inputs(enabled, &self.link);
        }
    }

    /// Release every mapper, reset the device and hand back the sink.
    pub fn shutdown(mut self) -> S {
        self.clients.clear();
        if !self.link.is_disconnected() {
            let mut reset = Message::reset();
            reset.header.sequence = 1;
            if self.link.send(&reset) != Outcome::Success {
                warn!("failed to reset device");
            }
        }
        self.link.into_sink()
    }
}
