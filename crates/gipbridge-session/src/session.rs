//! Protocol state machine for one logical client.

use std::collections::BTreeMap;

use bytes::Bytes;
use gipbridge_frame::{
    command, next_sequence, Acknowledgement, Arrival, ChunkBuffer, ChunkProgress, CommandHeader,
    Descriptor, Keystroke, Message, Outcome, Status,
};
use gipbridge_mapper::{DeviceMapper, MapperContext, MapperFactory};
use gipbridge_transport::PacketSink;
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::link::DeviceLink;

/// State for one client id on a device.
///
/// Calls must be serialised by the owner; the device router does this by
/// owning every session of its device.
pub struct ClientSession {
    client_id: u8,
    factory: MapperFactory,
    descriptor_failure_limit: u32,
    arrival: Option<Arrival>,
    descriptor: Option<Descriptor>,
    mapper: Option<Box<dyn DeviceMapper>>,
    descriptor_failures: u32,
    received_sequences: [u8; 256],
    sent_sequences: [u8; 256],
    chunk_buffers: BTreeMap<u8, ChunkBuffer>,
}

impl ClientSession {
    pub fn new(client_id: u8, factory: MapperFactory, config: &SessionConfig) -> Self {
        let mut chunk_buffers = BTreeMap::new();
        chunk_buffers.insert(command::DESCRIPTOR, ChunkBuffer::new());

        Self {
            client_id,
            factory,
            descriptor_failure_limit: config.descriptor_failure_limit.max(1),
            arrival: None,
            descriptor: None,
            mapper: None,
            descriptor_failures: 0,
            received_sequences: [0; 256],
            sent_sequences: [0; 256],
            chunk_buffers,
        }
    }

    pub fn client_id(&self) -> u8 {
        self.client_id
    }

    pub fn arrival(&self) -> Option<&Arrival> {
        self.arrival.as_ref()
    }

    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.descriptor.as_ref()
    }

    /// Name of the installed mapper, if any.
    pub fn mapper_name(&self) -> Option<&str> {
        self.mapper.as_deref().map(|mapper| mapper.name())
    }

    /// Handle one inbound message for this client.
    pub fn handle_message<S: PacketSink>(
        &mut self,
        header: CommandHeader,
        payload: &[u8],
        link: &mut DeviceLink<S>,
    ) -> Outcome {
        if header.data_length != payload.len() {
            debug!(
                client = self.client_id,
                command = header.command_id,
                declared = header.data_length,
                actual = payload.len(),
                "payload length mismatch"
            );
            return Outcome::InvalidMessage;
        }

        let original = header;
        let mut header = header;
        let chunk = header
            .is_chunked()
            .then(|| self.receive_chunk(&mut header, payload, link));

        // Acknowledge on every path, including pending and failed chunks
        if original.needs_acknowledgement()
            && self.acknowledge(&original, &header, link) == Outcome::Disconnected
        {
            return Outcome::Disconnected;
        }

        let reassembled: Bytes;
        let data = match chunk {
            None | Some(Ok(ChunkProgress::Empty)) => payload,
            Some(Ok(ChunkProgress::Pending)) => return Outcome::Pending,
            Some(Ok(ChunkProgress::Complete(bytes))) => {
                reassembled = bytes;
                &reassembled[..]
            }
            Some(Err(outcome)) => return outcome,
        };

        // Retransmissions repeat the sequence count
        let last = &mut self.received_sequences[usize::from(header.command_id)];
        if header.sequence == *last {
            trace!(
                client = self.client_id,
                command = header.command_id,
                sequence = header.sequence,
                "duplicate message"
            );
            return Outcome::Success;
        }
        *last = header.sequence;

        if header.is_system() {
            self.handle_system_command(header.command_id, data, link)
        } else {
            self.handle_mapper_command(header.command_id, data, link)
        }
    }

    fn receive_chunk<S: PacketSink>(
        &mut self,
        header: &mut CommandHeader,
        payload: &[u8],
        link: &mut DeviceLink<S>,
    ) -> Result<ChunkProgress, Outcome> {
        let buffer = self.chunk_buffers.entry(header.command_id).or_default();
        let err = match buffer.process_chunk(header, payload) {
            Ok(progress) => {
                if header.command_id == command::DESCRIPTOR
                    && matches!(progress, ChunkProgress::Complete(_))
                {
                    self.descriptor_failures = 0;
                }
                return Ok(progress);
            }
            Err(err) => err,
        };

        debug!(
            client = self.client_id,
            command = header.command_id,
            error = %err,
            "chunk rejected"
        );
        if header.command_id != command::DESCRIPTOR {
            return Err(Outcome::InvalidMessage);
        }

        self.descriptor_failures += 1;
        if self.descriptor_failures >= self.descriptor_failure_limit {
            warn!(
                client = self.client_id,
                failures = self.descriptor_failures,
                "descriptor could not be read, giving up on client"
            );
            return Err(Outcome::UnsupportedDevice);
        }

        let resend = self.send(link, Message::descriptor_request());
        if !resend.is_success() {
            return Err(resend);
        }
        Err(Outcome::InvalidMessage)
    }

    fn acknowledge<S: PacketSink>(
        &self,
        original: &CommandHeader,
        header: &CommandHeader,
        link: &mut DeviceLink<S>,
    ) -> Outcome {
        let (received, remaining) = match self.chunk_buffers.get(&header.command_id) {
            Some(buffer) if buffer.is_active() => (buffer.bytes_used(), buffer.bytes_remaining()),
            _ => (header.data_length, 0),
        };

        let ack = Acknowledgement::for_message(header, received, remaining).into_message(original);
        link.send(&ack)
    }

    fn handle_system_command<S: PacketSink>(
        &mut self,
        command_id: u8,
        data: &[u8],
        link: &mut DeviceLink<S>,
    ) -> Outcome {
        match command_id {
            command::ARRIVAL => self.handle_arrival(data, link),
            command::STATUS => self.handle_status(data),
            command::DESCRIPTOR => self.handle_descriptor(data, link),
            command::KEYSTROKE => self.handle_keystroke(data),
            _ => {
                trace!(client = self.client_id, command = command_id, "unhandled system command");
                Outcome::Success
            }
        }
    }

    fn handle_arrival<S: PacketSink>(&mut self, data: &[u8], link: &mut DeviceLink<S>) -> Outcome {
        let arrival = match Arrival::parse(data) {
            Ok(arrival) => arrival,
            Err(err) => {
                debug!(client = self.client_id, error = %err, "bad arrival message");
                return Outcome::InvalidMessage;
            }
        };

        info!(
            client = self.client_id,
            serial = format_args!("{:012X}", arrival.serial),
            vendor_id = format_args!("{:04X}", arrival.vendor_id),
            product_id = format_args!("{:04X}", arrival.product_id),
            "client connected"
        );
        self.arrival = Some(arrival);

        self.send(link, Message::descriptor_request())
    }

    fn handle_status(&mut self, data: &[u8]) -> Outcome {
        let status = match Status::parse(data) {
            Ok(status) => status,
            Err(err) => {
                debug!(client = self.client_id, error = %err, "bad status message");
                return Outcome::InvalidMessage;
            }
        };

        if !status.connected() {
            info!(client = self.client_id, "client reported disconnect");
            return Outcome::Disconnected;
        }

        trace!(
            client = self.client_id,
            battery_level = status.battery_level(),
            battery_type = status.battery_type(),
            "status"
        );
        Outcome::Success
    }

    fn handle_descriptor<S: PacketSink>(
        &mut self,
        data: &[u8],
        link: &mut DeviceLink<S>,
    ) -> Outcome {
        let descriptor = match Descriptor::parse(data) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                debug!(client = self.client_id, error = %err, "bad descriptor");
                return Outcome::InvalidMessage;
            }
        };
        self.descriptor_failures = 0;

        let supported = if link.inputs_enabled() {
            // Release the old controller before claiming a new one
            self.mapper = None;
            self.mapper = self
                .factory
                .by_interface_ids(self.mapper_context(link), &descriptor.interface_guids);
            self.mapper.is_some()
        } else {
            let context = self.mapper_context(link);
            self.factory
                .is_supported_by_interface_ids(&context, &descriptor.interface_guids)
        };

        let power = descriptor.supports_output(command::CONFIGURATION);
        let led = descriptor.supports_output(command::LED);
        let authentication = descriptor.supports_output(command::AUTHENTICATION);
        self.descriptor = Some(descriptor);

        if !supported {
            warn!(client = self.client_id, "no mapper available for client");
            return Outcome::UnsupportedDevice;
        }

        if !power {
            warn!(
                client = self.client_id,
                "descriptor does not list the configuration command, powering on anyway"
            );
        }

        let init = [
            Some(Message::power_on()),
            led.then(Message::led_enable),
            authentication.then(Message::authentication_success),
        ];
        for message in init.into_iter().flatten() {
            let outcome = self.send(link, message);
            if !outcome.is_success() {
                return outcome;
            }
        }
        Outcome::Success
    }

    fn handle_keystroke(&mut self, data: &[u8]) -> Outcome {
        let keys = match Keystroke::parse_all(data) {
            Ok(keys) => keys,
            Err(err) => {
                debug!(client = self.client_id, error = %err, "bad keystroke message");
                return Outcome::InvalidMessage;
            }
        };

        if let Some(mapper) = self.mapper.as_mut() {
            for key in keys {
                mapper.handle_keystroke(key);
            }
        }
        Outcome::Success
    }

    fn handle_mapper_command<S: PacketSink>(
        &mut self,
        command_id: u8,
        data: &[u8],
        link: &mut DeviceLink<S>,
    ) -> Outcome {
        if !link.inputs_enabled() {
            return Outcome::Success;
        }

        if self.mapper.is_none() {
            // Out of devices; nothing to drive
            let Some(mapper) = self.factory.fallback(self.mapper_context(link)) else {
                return Outcome::Success;
            };
            warn!(
                client = self.client_id,
                "client was not seen connecting, using the fallback mapper; reconnect it for full support"
            );
            self.mapper = Some(mapper);
        }

        let Some(mapper) = self.mapper.as_mut() else {
            return Outcome::Success;
        };
        let outcome = mapper.handle_message(command_id, data);
        let output: Vec<Message> = std::iter::from_fn(|| mapper.poll_output()).collect();

        for message in output {
            let sent = self.send(link, message);
            if !sent.is_success() {
                return sent;
            }
        }
        outcome
    }

    fn mapper_context<S: PacketSink>(&self, link: &DeviceLink<S>) -> MapperContext {
        let (vendor_id, product_id) = self
            .arrival
            .as_ref()
            .map_or((0, 0), |arrival| (arrival.vendor_id, arrival.product_id));
        MapperContext::new(vendor_id, product_id, link.kind().maps_guide_button())
    }

    /// Stamp the client id and next sequence count, then send.
    pub fn send<S: PacketSink>(&mut self, link: &mut DeviceLink<S>, mut message: Message) -> Outcome {
        let slot = &mut self.sent_sequences[usize::from(message.header.command_id)];
        *slot = next_sequence(*slot);

        message.header.client_id = self.client_id;
        message.header.sequence = *slot;
        link.send(&message)
    }

    /// Drop the current mapper and, when enabling, rebuild it from the known
    /// descriptor.
    pub fn enable_inputs<S: PacketSink>(&mut self, enabled: bool, link: &DeviceLink<S>) {
        self.mapper = None;

        let mapper = match &self.descriptor {
            Some(descriptor) if enabled => self
                .factory
                .by_interface_ids(self.mapper_context(link), &descriptor.interface_guids),
            _ => None,
        };
        self.mapper = mapper;
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("client_id", &self.client_id)
            .field("arrival", &self.arrival)
            .field("mapper", &self.mapper_name())
            .field("descriptor_failures", &self.descriptor_failures)
            .finish()
    }
}
