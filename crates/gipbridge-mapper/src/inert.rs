use gipbridge_frame::Outcome;
use tracing::trace;

use crate::contract::{DeviceMapper, MapperContext};

/// Accepts and discards everything.
///
/// Installed for devices that are recognised as present but are not mapped.
#[derive(Debug, Clone)]
pub struct InertMapper {
    context: MapperContext,
}

impl InertMapper {
    pub fn new(context: MapperContext) -> Self {
        Self { context }
    }
}

impl DeviceMapper for InertMapper {
    fn handle_message(&mut self, command: u8, data: &[u8]) -> Outcome {
        trace!(command, len = data.len(), "inert mapper discarding message");
        Outcome::Success
    }

    fn reset_report(&mut self) {}

    fn context(&self) -> &MapperContext {
        &self.context
    }

    fn name(&self) -> &str {
        "inert"
    }
}
