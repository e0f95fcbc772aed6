//! Outer capture loop over many devices.

use std::collections::BTreeMap;

use gipbridge_frame::Outcome;
use gipbridge_mapper::MapperFactory;
use gipbridge_transport::{PacketSink, TransportKind};
use tracing::{error, info};

use crate::config::SessionConfig;
use crate::device::DeviceRouter;
use crate::error::CaptureError;

/// Packets from many devices, keyed by a transport-specific device id.
///
/// Devices are created on their first packet. A device whose packet cannot be
/// decoded stops the whole capture: every device is dropped and later packets
/// are refused.
pub struct Capture<S, F>
where
    S: PacketSink,
    F: FnMut(u64) -> S,
{
    devices: BTreeMap<u64, DeviceRouter<S>>,
    open_sink: F,
    kind: TransportKind,
    factory: MapperFactory,
    config: SessionConfig,
    stopped: bool,
}

impl<S, F> Capture<S, F>
where
    S: PacketSink,
    F: FnMut(u64) -> S,
{
    /// `open_sink` provides the outbound sink for a newly seen device.
    pub fn new(kind: TransportKind, factory: MapperFactory, config: SessionConfig, open_sink: F) -> Self {
        Self {
            devices: BTreeMap::new(),
            open_sink,
            kind,
            factory,
            config,
            stopped: false,
        }
    }

    pub fn handle_packet(&mut self, device_id: u64, packet: &[u8]) -> Result<Outcome, CaptureError> {
        if self.stopped {
            return Err(CaptureError::Stopped);
        }

        let device = self.devices.entry(device_id).or_insert_with(|| {
            info!(device_id, transport = self.kind.name(), "new device");
            DeviceRouter::with_config(
                (self.open_sink)(device_id),
                self.kind,
                self.factory.clone(),
                self.config,
            )
        });

        match device.handle_packet(packet) {
            Ok(outcome) => {
                if outcome.is_fatal() {
                    self.devices.remove(&device_id);
                    info!(device_id, %outcome, "device removed");
                }
                Ok(outcome)
            }
            Err(source) => {
                error!(device_id, error = %source, "packet handling failed, stopping capture");
                self.stop();
                Err(CaptureError::Fault { device_id, source })
            }
        }
    }

    pub fn enable_inputs(&mut self, enabled: bool) {
        self.config.inputs_enabled = enabled;
        for device in self.devices.values_mut() {
            device.enable_inputs(enabled);
        }
    }

    /// Drop every device and refuse further packets.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.devices.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn device(&self, device_id: u64) -> Option<&DeviceRouter<S>> {
        self.devices.get(&device_id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
