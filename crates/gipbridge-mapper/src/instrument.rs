//! Mappers for every supported instrument family.

use std::fmt;

use gipbridge_frame::{command, Message, Outcome};
use tracing::{debug, warn};

use crate::backend::MappingMode;
use crate::contract::{DeviceMapper, MapperContext};
use crate::controller::VirtualController;
use crate::input::{DrumInput, GamepadInput, GhlInput, GipButtons, GuitarInput, InstrumentInput};

/// Instrument families with their own report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperFamily {
    Gamepad,
    Guitar,
    /// Guitar with a thumb joystick.
    RiffmasterGuitar,
    Drums,
    /// Guitar Hero Live 6-fret guitar.
    GhlGuitar,
    /// Adapter forwarding a last-generation controller as a gamepad report.
    WirelessLegacy,
    /// Unknown layout; only the common button word is mapped.
    Fallback,
}

impl MapperFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            MapperFamily::Gamepad => "gamepad",
            MapperFamily::Guitar => "guitar",
            MapperFamily::RiffmasterGuitar => "riffmaster",
            MapperFamily::Drums => "drums",
            MapperFamily::GhlGuitar => "ghl-guitar",
            MapperFamily::WirelessLegacy => "wireless-legacy",
            MapperFamily::Fallback => "fallback",
        }
    }

    pub fn parse_input(self, data: &[u8]) -> Option<InstrumentInput> {
        match self {
            MapperFamily::Gamepad | MapperFamily::WirelessLegacy => {
                GamepadInput::parse(data).map(InstrumentInput::Gamepad)
            }
            MapperFamily::Guitar => GuitarInput::parse(data, false).map(InstrumentInput::Guitar),
            MapperFamily::RiffmasterGuitar => {
                GuitarInput::parse(data, true).map(InstrumentInput::Guitar)
            }
            MapperFamily::Drums => DrumInput::parse(data).map(InstrumentInput::Drums),
            MapperFamily::GhlGuitar => GhlInput::parse(data).map(InstrumentInput::Ghl),
            MapperFamily::Fallback => (data.len() >= 2).then(|| {
                InstrumentInput::Buttons(GipButtons::from_bits_retain(u16::from_le_bytes([
                    data[0], data[1],
                ])))
            }),
        }
    }

    /// Whether host rumble requests are forwarded to the device.
    pub fn forwards_rumble(self) -> bool {
        matches!(self, MapperFamily::Gamepad | MapperFamily::WirelessLegacy)
    }
}

impl fmt::Display for MapperFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapper for one instrument family on one backend.
pub struct InstrumentMapper {
    family: MapperFamily,
    mode: MappingMode,
    controller: Box<dyn VirtualController>,
    input: InstrumentInput,
    guide: bool,
    context: MapperContext,
    name: String,
}

impl InstrumentMapper {
    pub fn new(
        family: MapperFamily,
        mode: MappingMode,
        controller: Box<dyn VirtualController>,
        context: MapperContext,
    ) -> Self {
        Self {
            family,
            mode,
            controller,
            input: InstrumentInput::default(),
            guide: false,
            context,
            name: format!("{family}/{mode}"),
        }
    }

    pub fn family(&self) -> MapperFamily {
        self.family
    }

    pub fn mode(&self) -> MappingMode {
        self.mode
    }

    pub fn controller_id(&self) -> u32 {
        self.controller.id()
    }

    fn submit(&mut self) {
        let report = self.input.translate(self.mode, self.guide);
        if let Err(err) = self.controller.submit(&report) {
            warn!(mapper = %self.name, error = %err, "failed to submit controller report");
        }
    }
}

impl fmt::Debug for InstrumentMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentMapper")
            .field("family", &self.family)
            .field("mode", &self.mode)
            .field("controller", &self.controller.id())
            .field("context", &self.context)
            .finish()
    }
}

impl DeviceMapper for InstrumentMapper {
    fn handle_message(&mut self, command: u8, data: &[u8]) -> Outcome {
        if command != command::INPUT {
            debug!(mapper = %self.name, command, "ignoring unhandled command");
            return Outcome::Success;
        }

        match self.family.parse_input(data) {
            Some(input) => {
                self.input = input;
                self.submit();
                Outcome::Success
            }
            None => {
                debug!(mapper = %self.name, len = data.len(), "input report too short");
                Outcome::InvalidMessage
            }
        }
    }

    fn reset_report(&mut self) {
        self.input = InstrumentInput::default();
        self.guide = false;
        self.submit();
    }

    fn map_guide_button(&mut self, pressed: bool) {
        self.guide = pressed;
        self.submit();
    }

    fn poll_output(&mut self) -> Option<Message> {
        if !self.family.forwards_rumble() {
            return None;
        }
        let feedback = self.controller.take_feedback()?;
        Some(Message::gamepad_rumble(
            feedback.large_motor,
            feedback.small_motor,
        ))
    }

    fn context(&self) -> &MapperContext {
        &self.context
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for InstrumentMapper {
    fn drop(&mut self) {
        self.reset_report();
        debug!(mapper = %self.name, controller = self.controller.id(), "mapper released");
    }
}

#[cfg(test)]
mod tests {
    use gipbridge_frame::Keystroke;

    use super::*;
    use crate::backend::{ControllerBackend, InMemoryBackend};
    use crate::controller::{ControllerReport, Feedback, XboxButtons};

    fn mapper(
        family: MapperFamily,
        guide: bool,
    ) -> (InstrumentMapper, InMemoryBackend) {
        let backend = InMemoryBackend::new(MappingMode::ViGEm, 4);
        let controller = backend.create().unwrap();
        let mapper = InstrumentMapper::new(
            family,
            MappingMode::ViGEm,
            controller,
            MapperContext::new(0x0738, 0x4161, guide),
        );
        (mapper, backend)
    }

    fn last_xbox(backend: &InMemoryBackend, id: u32) -> crate::controller::XboxReport {
        match backend.last_report(id) {
            Some(ControllerReport::Xbox(report)) => report,
            other => panic!("expected xbox report, got {other:?}"),
        }
    }

    #[test]
    fn input_report_is_submitted() {
        let (mut mapper, backend) = mapper(MapperFamily::Guitar, false);
        let outcome = mapper.handle_message(command::INPUT, &[0, 0, 0, 0, 0, 0x01, 0]);
        assert_eq!(outcome, Outcome::Success);
        assert!(last_xbox(&backend, mapper.controller_id())
            .buttons
            .contains(XboxButtons::A));
        assert_eq!(mapper.name(), "guitar/vigem");
    }

    #[test]
    fn short_input_is_invalid_and_not_submitted() {
        let (mut mapper, backend) = mapper(MapperFamily::Drums, false);
        assert_eq!(
            mapper.handle_message(command::INPUT, &[0, 0, 0]),
            Outcome::InvalidMessage
        );
        assert_eq!(backend.report_count(), 0);
    }

    #[test]
    fn other_commands_are_ignored() {
        let (mut mapper, backend) = mapper(MapperFamily::Guitar, false);
        assert_eq!(mapper.handle_message(0x21, &[1, 2]), Outcome::Success);
        assert_eq!(backend.report_count(), 0);
    }

    #[test]
    fn guide_keystroke_respects_policy() {
        let guide_down = Keystroke { pressed: true, key_code: 0x5B };

        let (mut allowed, backend) = mapper(MapperFamily::Gamepad, true);
        allowed.handle_keystroke(guide_down);
        assert!(last_xbox(&backend, allowed.controller_id())
            .buttons
            .contains(XboxButtons::GUIDE));

        let (mut blocked, backend) = mapper(MapperFamily::Gamepad, false);
        blocked.handle_keystroke(guide_down);
        assert_eq!(backend.report_count(), 0);
    }

    #[test]
    fn non_guide_keystrokes_are_ignored() {
        let (mut mapper, backend) = mapper(MapperFamily::Gamepad, true);
        mapper.handle_keystroke(Keystroke { pressed: true, key_code: 0x10 });
        assert_eq!(backend.report_count(), 0);
    }

    #[test]
    fn gamepad_forwards_rumble() {
        let (mut mapper, backend) = mapper(MapperFamily::Gamepad, false);
        assert!(mapper.poll_output().is_none());

        backend.push_feedback(
            mapper.controller_id(),
            Feedback { large_motor: 0x40, small_motor: 0x80 },
        );
        let rumble = mapper.poll_output().unwrap();
        assert_eq!(rumble.header.command_id, command::GAMEPAD_RUMBLE);
        assert_eq!(rumble.data[4], 0x40);
        assert_eq!(rumble.data[5], 0x80);
    }

    #[test]
    fn guitars_do_not_forward_rumble() {
        let (mut mapper, backend) = mapper(MapperFamily::Guitar, false);
        backend.push_feedback(mapper.controller_id(), Feedback::default());
        assert!(mapper.poll_output().is_none());
    }

    #[test]
    fn drop_resets_and_releases_controller() {
        let (mut mapper, backend) = mapper(MapperFamily::Guitar, false);
        let _ = mapper.handle_message(command::INPUT, &[0, 0, 0, 0, 0, 0x01, 0]);
        let id = mapper.controller_id();
        drop(mapper);

        assert!(backend.last_report(id).unwrap().is_neutral());
        assert!(backend.active().is_empty());
    }

    #[test]
    fn fallback_maps_common_buttons() {
        let input = MapperFamily::Fallback.parse_input(&[0x10, 0x00]).unwrap();
        assert_eq!(input, InstrumentInput::Buttons(GipButtons::A));
        assert!(MapperFamily::Fallback.parse_input(&[0x10]).is_none());
    }
}
