//! Virtual controller model.
//!
//! Mappers produce one of two report shapes: an Xbox 360 style pad (ViGEm and
//! RPCS3 modes) or a generic joystick with numbered buttons (vJoy mode).

use bitflags::bitflags;
use serde::Serialize;

use crate::backend::MappingMode;
use crate::error::Result;

bitflags! {
    /// Xbox 360 button bits, as reported to XInput.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct XboxButtons: u16 {
        const DPAD_UP = 0x0001;
        const DPAD_DOWN = 0x0002;
        const DPAD_LEFT = 0x0004;
        const DPAD_RIGHT = 0x0008;
        const START = 0x0010;
        const BACK = 0x0020;
        const LEFT_THUMB = 0x0040;
        const RIGHT_THUMB = 0x0080;
        const LEFT_SHOULDER = 0x0100;
        const RIGHT_SHOULDER = 0x0200;
        const GUIDE = 0x0400;
        const A = 0x1000;
        const B = 0x2000;
        const X = 0x4000;
        const Y = 0x8000;
    }
}

/// Xbox 360 shaped report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct XboxReport {
    pub buttons: XboxButtons,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_thumb_x: i16,
    pub left_thumb_y: i16,
    pub right_thumb_x: i16,
    pub right_thumb_y: i16,
}

/// Generic joystick report.
///
/// Button `n` (1-based) is bit `n - 1` of `buttons`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JoystickReport {
    pub buttons: u32,
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl JoystickReport {
    pub fn set_button(&mut self, number: u8, pressed: bool) {
        if !(1..=32).contains(&number) {
            return;
        }
        let bit = 1u32 << (number - 1);
        if pressed {
            self.buttons |= bit;
        } else {
            self.buttons &= !bit;
        }
    }

    pub fn button(&self, number: u8) -> bool {
        (1..=32).contains(&number) && self.buttons & (1u32 << (number - 1)) != 0
    }
}

/// One report submitted to a virtual controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControllerReport {
    Xbox(XboxReport),
    Joystick(JoystickReport),
}

impl ControllerReport {
    /// The all-released report for a mapping mode.
    pub fn neutral(mode: MappingMode) -> Self {
        match mode {
            MappingMode::ViGEm | MappingMode::Rpcs3 => ControllerReport::Xbox(XboxReport::default()),
            MappingMode::VJoy => ControllerReport::Joystick(JoystickReport::default()),
        }
    }

    pub fn is_neutral(&self) -> bool {
        match self {
            ControllerReport::Xbox(report) => *report == XboxReport::default(),
            ControllerReport::Joystick(report) => *report == JoystickReport::default(),
        }
    }
}

/// Force feedback requested by the host for a virtual controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Feedback {
    pub large_motor: u8,
    pub small_motor: u8,
}

/// A live virtual controller handle.
///
/// Dropping the handle unplugs the device and frees its backend slot.
pub trait VirtualController {
    /// Backend-assigned device number, unique while the handle is alive.
    fn id(&self) -> u32;

    fn submit(&mut self, report: &ControllerReport) -> Result<()>;

    /// Take the most recent feedback request, if any arrived since the last call.
    fn take_feedback(&mut self) -> Option<Feedback>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joystick_buttons_are_one_based() {
        let mut report = JoystickReport::default();
        report.set_button(1, true);
        report.set_button(32, true);
        assert_eq!(report.buttons, 0x8000_0001);
        assert!(report.button(1));
        assert!(!report.button(2));

        report.set_button(1, false);
        assert_eq!(report.buttons, 0x8000_0000);
    }

    #[test]
    fn joystick_ignores_out_of_range_buttons() {
        let mut report = JoystickReport::default();
        report.set_button(0, true);
        report.set_button(33, true);
        assert_eq!(report.buttons, 0);
        assert!(!report.button(0));
    }

    #[test]
    fn neutral_report_matches_mode() {
        assert!(matches!(
            ControllerReport::neutral(MappingMode::ViGEm),
            ControllerReport::Xbox(_)
        ));
        assert!(matches!(
            ControllerReport::neutral(MappingMode::Rpcs3),
            ControllerReport::Xbox(_)
        ));
        assert!(matches!(
            ControllerReport::neutral(MappingMode::VJoy),
            ControllerReport::Joystick(_)
        ));
        assert!(ControllerReport::neutral(MappingMode::VJoy).is_neutral());
    }

    #[test]
    fn report_serializes_with_kind_tag() {
        let report = ControllerReport::Xbox(XboxReport {
            buttons: XboxButtons::A,
            ..XboxReport::default()
        });
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["kind"], "xbox");
        assert_eq!(json["left_trigger"], 0);
    }
}
