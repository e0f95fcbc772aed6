use gipbridge_frame::{Keystroke, Message, Outcome};

/// Identity and policy of the client a mapper serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapperContext {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Whether the guide button may be forwarded to the virtual controller.
    ///
    /// Off on transports where the OS already acts on the guide button.
    pub map_guide_button: bool,
}

impl MapperContext {
    pub fn new(vendor_id: u16, product_id: u16, map_guide_button: bool) -> Self {
        Self {
            vendor_id,
            product_id,
            map_guide_button,
        }
    }
}

/// Translates one client's input into virtual controller state.
///
/// Dropping a mapper releases its virtual controller; implementations submit a
/// neutral report first.
pub trait DeviceMapper {
    /// Handle one non-system command from the client.
    fn handle_message(&mut self, command: u8, data: &[u8]) -> Outcome;

    /// Zero held state and submit one neutral report.
    fn reset_report(&mut self);

    /// Press or release the guide button.
    fn map_guide_button(&mut self, _pressed: bool) {}

    fn handle_keystroke(&mut self, key: Keystroke) {
        if key.is_guide() && self.context().map_guide_button {
            self.map_guide_button(key.pressed);
        }
    }

    /// Output the mapper wants sent to the client, such as rumble.
    fn poll_output(&mut self) -> Option<Message> {
        None
    }

    fn context(&self) -> &MapperContext;

    /// Short human-readable name, e.g. `guitar/vigem`.
    fn name(&self) -> &str;
}
