//! Instrument input reports and their translation to controller reports.
//!
//! Only the fields every variant of a family shares are decoded here; every
//! layout starts with the common 16-bit button word.

use bitflags::bitflags;

use crate::backend::MappingMode;
use crate::controller::{ControllerReport, JoystickReport, XboxButtons, XboxReport};

bitflags! {
    /// Button word shared by every GIP input report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GipButtons: u16 {
        const SYNC = 0x0001;
        const MENU = 0x0004;
        const VIEW = 0x0008;
        const A = 0x0010;
        const B = 0x0020;
        const X = 0x0040;
        const Y = 0x0080;
        const DPAD_UP = 0x0100;
        const DPAD_DOWN = 0x0200;
        const DPAD_LEFT = 0x0400;
        const DPAD_RIGHT = 0x0800;
        const LEFT_BUMPER = 0x1000;
        const RIGHT_BUMPER = 0x2000;
        const LEFT_STICK = 0x4000;
        const RIGHT_STICK = 0x8000;
    }
}

const BUTTON_PAIRS: [(GipButtons, XboxButtons); 14] = [
    (GipButtons::MENU, XboxButtons::START),
    (GipButtons::VIEW, XboxButtons::BACK),
    (GipButtons::A, XboxButtons::A),
    (GipButtons::B, XboxButtons::B),
    (GipButtons::X, XboxButtons::X),
    (GipButtons::Y, XboxButtons::Y),
    (GipButtons::DPAD_UP, XboxButtons::DPAD_UP),
    (GipButtons::DPAD_DOWN, XboxButtons::DPAD_DOWN),
    (GipButtons::DPAD_LEFT, XboxButtons::DPAD_LEFT),
    (GipButtons::DPAD_RIGHT, XboxButtons::DPAD_RIGHT),
    (GipButtons::LEFT_BUMPER, XboxButtons::LEFT_SHOULDER),
    (GipButtons::RIGHT_BUMPER, XboxButtons::RIGHT_SHOULDER),
    (GipButtons::LEFT_STICK, XboxButtons::LEFT_THUMB),
    (GipButtons::RIGHT_STICK, XboxButtons::RIGHT_THUMB),
];

impl GipButtons {
    fn read(data: &[u8]) -> Self {
        GipButtons::from_bits_retain(u16::from_le_bytes([data[0], data[1]]))
    }

    pub fn to_xbox(self) -> XboxButtons {
        BUTTON_PAIRS
            .iter()
            .filter(|(gip, _)| self.contains(*gip))
            .fold(XboxButtons::empty(), |acc, (_, xbox)| acc | *xbox)
    }
}

bitflags! {
    /// Five-fret guitar neck bits, used by both fret rows.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Frets: u8 {
        const GREEN = 0x01;
        const RED = 0x02;
        const YELLOW = 0x04;
        const BLUE = 0x08;
        const ORANGE = 0x10;
    }
}

impl Frets {
    fn to_xbox(self) -> XboxButtons {
        let mut buttons = XboxButtons::empty();
        buttons.set(XboxButtons::A, self.contains(Frets::GREEN));
        buttons.set(XboxButtons::B, self.contains(Frets::RED));
        buttons.set(XboxButtons::Y, self.contains(Frets::YELLOW));
        buttons.set(XboxButtons::X, self.contains(Frets::BLUE));
        buttons.set(XboxButtons::LEFT_SHOULDER, self.contains(Frets::ORANGE));
        buttons
    }
}

bitflags! {
    /// Guitar Hero Live 3x2 fret layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GhlFrets: u8 {
        const BLACK1 = 0x01;
        const BLACK2 = 0x02;
        const BLACK3 = 0x04;
        const WHITE1 = 0x08;
        const WHITE2 = 0x10;
        const WHITE3 = 0x20;
    }
}

/// Full-size gamepad report, also forwarded by the wireless legacy adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadInput {
    pub buttons: GipButtons,
    /// 10-bit trigger values.
    pub left_trigger: u16,
    pub right_trigger: u16,
    pub left_stick_x: i16,
    pub left_stick_y: i16,
    pub right_stick_x: i16,
    pub right_stick_y: i16,
}

impl GamepadInput {
    pub const SIZE: usize = 14;

    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([data[i], data[i + 1]]);
        Some(Self {
            buttons: GipButtons::read(data),
            left_trigger: u16_at(2),
            right_trigger: u16_at(4),
            left_stick_x: i16_at(6),
            left_stick_y: i16_at(8),
            right_stick_x: i16_at(10),
            right_stick_y: i16_at(12),
        })
    }
}

/// Rock band guitar report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuitarInput {
    pub buttons: GipButtons,
    pub tilt: u8,
    pub whammy: u8,
    pub pickup: u8,
    pub upper_frets: Frets,
    pub lower_frets: Frets,
    /// Only present on guitars with a thumb joystick.
    pub joystick: Option<(i16, i16)>,
}

impl GuitarInput {
    pub const SIZE: usize = 7;
    pub const JOYSTICK_SIZE: usize = 11;

    pub fn parse(data: &[u8], with_joystick: bool) -> Option<Self> {
        let needed = if with_joystick { Self::JOYSTICK_SIZE } else { Self::SIZE };
        if data.len() < needed {
            return None;
        }
        let joystick = with_joystick.then(|| {
            (
                i16::from_le_bytes([data[7], data[8]]),
                i16::from_le_bytes([data[9], data[10]]),
            )
        });
        Some(Self {
            buttons: GipButtons::read(data),
            tilt: data[2],
            whammy: data[3],
            pickup: data[4],
            upper_frets: Frets::from_bits_truncate(data[5]),
            lower_frets: Frets::from_bits_truncate(data[6]),
            joystick,
        })
    }
}

/// Rock band drumkit report. Velocities are 4-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrumInput {
    pub buttons: GipButtons,
    pub red_pad: u8,
    pub yellow_pad: u8,
    pub blue_pad: u8,
    pub green_pad: u8,
    pub yellow_cymbal: u8,
    pub blue_cymbal: u8,
    pub green_cymbal: u8,
}

impl DrumInput {
    pub const SIZE: usize = 6;

    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            buttons: GipButtons::read(data),
            red_pad: data[2] >> 4,
            yellow_pad: data[2] & 0x0F,
            blue_pad: data[3] >> 4,
            green_pad: data[3] & 0x0F,
            yellow_cymbal: data[4] >> 4,
            blue_cymbal: data[4] & 0x0F,
            green_cymbal: data[5] >> 4,
        })
    }
}

/// Guitar Hero Live guitar report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GhlInput {
    pub buttons: GipButtons,
    pub frets: GhlFrets,
    /// 0x00 is strum up, 0xFF strum down, anything else centred.
    pub strum: u8,
    pub whammy: u8,
    pub tilt: u8,
}

impl GhlInput {
    pub const SIZE: usize = 6;

    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            buttons: GipButtons::read(data),
            frets: GhlFrets::from_bits_truncate(data[2]),
            strum: data[3],
            whammy: data[4],
            tilt: data[5],
        })
    }
}

/// Parsed input for any instrument family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentInput {
    Gamepad(GamepadInput),
    Guitar(GuitarInput),
    Drums(DrumInput),
    Ghl(GhlInput),
    Buttons(GipButtons),
}

impl Default for InstrumentInput {
    fn default() -> Self {
        InstrumentInput::Buttons(GipButtons::empty())
    }
}

/// Scale an unsigned byte across the full signed axis range.
fn byte_to_axis(value: u8) -> i16 {
    ((i32::from(value) * 0xFFFF / 0xFF) - 0x8000) as i16
}

/// Scale an unsigned byte across the positive half of the axis.
fn byte_to_half_axis(value: u8) -> i16 {
    (i32::from(value) * i32::from(i16::MAX) / 0xFF) as i16
}

fn nibble_to_axis(value: u8) -> i16 {
    (i32::from(value & 0x0F) * i32::from(i16::MAX) / 0x0F) as i16
}

fn trigger_to_byte(value: u16) -> u8 {
    (u32::from(value.min(0x3FF)) * 0xFF / 0x3FF) as u8
}

impl InstrumentInput {
    /// Translate to the report shape of `mode`, with the guide button applied.
    pub fn translate(&self, mode: MappingMode, guide: bool) -> ControllerReport {
        match mode {
            MappingMode::VJoy => {
                let mut report = self.to_joystick();
                report.set_button(JOYSTICK_GUIDE_BUTTON, guide);
                ControllerReport::Joystick(report)
            }
            MappingMode::ViGEm | MappingMode::Rpcs3 => {
                let mut report = self.to_xbox(mode);
                report.buttons.set(XboxButtons::GUIDE, guide);
                ControllerReport::Xbox(report)
            }
        }
    }

    fn to_xbox(&self, mode: MappingMode) -> XboxReport {
        match self {
            InstrumentInput::Gamepad(pad) => XboxReport {
                buttons: pad.buttons.to_xbox(),
                left_trigger: trigger_to_byte(pad.left_trigger),
                right_trigger: trigger_to_byte(pad.right_trigger),
                left_thumb_x: pad.left_stick_x,
                left_thumb_y: pad.left_stick_y,
                right_thumb_x: pad.right_stick_x,
                right_thumb_y: pad.right_stick_y,
            },
            InstrumentInput::Guitar(guitar) => {
                let solo = !guitar.lower_frets.is_empty();
                let mut buttons = guitar.buttons.to_xbox()
                    & !(XboxButtons::A | XboxButtons::B | XboxButtons::X | XboxButtons::Y);
                buttons |= (guitar.upper_frets | guitar.lower_frets).to_xbox();
                buttons.set(XboxButtons::LEFT_THUMB, solo);

                let (left_thumb_x, left_thumb_y) = guitar.joystick.unwrap_or((0, 0));
                let right_thumb_y = match mode {
                    MappingMode::Rpcs3 => byte_to_axis(guitar.tilt),
                    _ => byte_to_half_axis(guitar.tilt),
                };
                XboxReport {
                    buttons,
                    left_trigger: guitar.pickup,
                    right_trigger: 0,
                    left_thumb_x,
                    left_thumb_y,
                    right_thumb_x: byte_to_axis(guitar.whammy),
                    right_thumb_y,
                }
            }
            InstrumentInput::Drums(drums) => {
                let mut buttons = drums.buttons.to_xbox()
                    & !(XboxButtons::A | XboxButtons::B | XboxButtons::X | XboxButtons::Y);
                let pads = [drums.red_pad, drums.yellow_pad, drums.blue_pad, drums.green_pad];
                let cymbals = [drums.yellow_cymbal, drums.blue_cymbal, drums.green_cymbal];
                buttons.set(XboxButtons::B, drums.red_pad != 0);
                buttons.set(
                    XboxButtons::Y,
                    drums.yellow_pad != 0 || drums.yellow_cymbal != 0,
                );
                buttons.set(XboxButtons::X, drums.blue_pad != 0 || drums.blue_cymbal != 0);
                buttons.set(XboxButtons::A, drums.green_pad != 0 || drums.green_cymbal != 0);
                buttons.set(XboxButtons::RIGHT_THUMB, pads.iter().any(|v| *v != 0));
                buttons.set(XboxButtons::RIGHT_SHOULDER, cymbals.iter().any(|v| *v != 0));

                XboxReport {
                    buttons,
                    left_trigger: 0,
                    right_trigger: 0,
                    left_thumb_x: nibble_to_axis(drums.red_pad),
                    left_thumb_y: nibble_to_axis(drums.yellow_pad.max(drums.yellow_cymbal)),
                    right_thumb_x: nibble_to_axis(drums.blue_pad.max(drums.blue_cymbal)),
                    right_thumb_y: nibble_to_axis(drums.green_pad.max(drums.green_cymbal)),
                }
            }
            InstrumentInput::Ghl(ghl) => {
                let mut buttons = ghl.buttons.to_xbox()
                    & !(XboxButtons::DPAD_UP | XboxButtons::DPAD_DOWN);
                buttons.set(XboxButtons::A, ghl.frets.contains(GhlFrets::WHITE1));
                buttons.set(XboxButtons::B, ghl.frets.contains(GhlFrets::WHITE2));
                buttons.set(XboxButtons::Y, ghl.frets.contains(GhlFrets::WHITE3));
                buttons.set(XboxButtons::X, ghl.frets.contains(GhlFrets::BLACK1));
                buttons.set(XboxButtons::LEFT_SHOULDER, ghl.frets.contains(GhlFrets::BLACK2));
                buttons.set(XboxButtons::RIGHT_SHOULDER, ghl.frets.contains(GhlFrets::BLACK3));
                buttons.set(XboxButtons::DPAD_UP, ghl.strum == 0x00);
                buttons.set(XboxButtons::DPAD_DOWN, ghl.strum == 0xFF);
                XboxReport {
                    buttons,
                    right_thumb_x: byte_to_axis(ghl.tilt),
                    right_thumb_y: byte_to_axis(ghl.whammy),
                    ..XboxReport::default()
                }
            }
            InstrumentInput::Buttons(buttons) => XboxReport {
                buttons: buttons.to_xbox(),
                ..XboxReport::default()
            },
        }
    }

    fn to_joystick(&self) -> JoystickReport {
        let mut report = JoystickReport::default();
        match self {
            InstrumentInput::Gamepad(pad) => {
                report.buttons = u32::from(pad.buttons.bits());
                report.x = pad.left_stick_x;
                report.y = pad.left_stick_y;
                report.z = byte_to_axis(trigger_to_byte(pad.right_trigger));
            }
            InstrumentInput::Guitar(guitar) => {
                report.buttons = u32::from(guitar.buttons.bits())
                    | u32::from((guitar.upper_frets | guitar.lower_frets).bits()) << 16;
                report.x = byte_to_axis(guitar.whammy);
                report.y = byte_to_axis(guitar.tilt);
                report.z = byte_to_axis(guitar.pickup);
            }
            InstrumentInput::Drums(drums) => {
                let pads = [drums.red_pad, drums.yellow_pad, drums.blue_pad, drums.green_pad];
                let cymbals = [drums.yellow_cymbal, drums.blue_cymbal, drums.green_cymbal];
                let mut hits = 0u32;
                for (i, velocity) in pads.iter().chain(cymbals.iter()).enumerate() {
                    if *velocity != 0 {
                        hits |= 1 << i;
                    }
                }
                report.buttons = u32::from(drums.buttons.bits()) | hits << 16;
            }
            InstrumentInput::Ghl(ghl) => {
                report.buttons =
                    u32::from(ghl.buttons.bits()) | u32::from(ghl.frets.bits()) << 16;
                report.x = byte_to_axis(ghl.whammy);
                report.y = byte_to_axis(ghl.tilt);
                report.z = byte_to_axis(ghl.strum);
            }
            InstrumentInput::Buttons(buttons) => {
                report.buttons = u32::from(buttons.bits());
            }
        }
        report
    }
}

/// The GIP button word leaves bit 1 unused; vJoy button 2 carries the guide button.
const JOYSTICK_GUIDE_BUTTON: u8 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamepad_report_parses_and_translates() {
        let mut data = vec![0u8; GamepadInput::SIZE];
        data[0] = 0x14; // MENU | A
        data[2..4].copy_from_slice(&0x3FFu16.to_le_bytes());
        data[6..8].copy_from_slice(&(-1000i16).to_le_bytes());

        let pad = GamepadInput::parse(&data).unwrap();
        assert_eq!(pad.buttons, GipButtons::MENU | GipButtons::A);
        assert_eq!(pad.left_stick_x, -1000);

        let ControllerReport::Xbox(report) =
            InstrumentInput::Gamepad(pad).translate(MappingMode::ViGEm, false)
        else {
            panic!("expected xbox report");
        };
        assert_eq!(report.buttons, XboxButtons::START | XboxButtons::A);
        assert_eq!(report.left_trigger, 0xFF);
        assert_eq!(report.left_thumb_x, -1000);
    }

    #[test]
    fn short_reports_are_rejected() {
        assert!(GamepadInput::parse(&[0; 13]).is_none());
        assert!(GuitarInput::parse(&[0; 6], false).is_none());
        assert!(GuitarInput::parse(&[0; 10], true).is_none());
        assert!(DrumInput::parse(&[0; 5]).is_none());
        assert!(GhlInput::parse(&[0; 5]).is_none());
    }

    #[test]
    fn guitar_frets_and_solo_flag() {
        let data = [0x00, 0x00, 0x00, 0x80, 0x00, 0x01, 0x08];
        let guitar = GuitarInput::parse(&data, false).unwrap();
        assert_eq!(guitar.upper_frets, Frets::GREEN);
        assert_eq!(guitar.lower_frets, Frets::BLUE);
        assert!(guitar.joystick.is_none());

        let ControllerReport::Xbox(report) =
            InstrumentInput::Guitar(guitar).translate(MappingMode::ViGEm, false)
        else {
            panic!("expected xbox report");
        };
        assert!(report.buttons.contains(XboxButtons::A | XboxButtons::X));
        assert!(report.buttons.contains(XboxButtons::LEFT_THUMB));
    }

    #[test]
    fn tilt_axis_range_depends_on_mode() {
        let data = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let guitar = InstrumentInput::Guitar(GuitarInput::parse(&data, false).unwrap());

        let ControllerReport::Xbox(vigem) = guitar.translate(MappingMode::ViGEm, false) else {
            panic!("expected xbox report");
        };
        let ControllerReport::Xbox(rpcs3) = guitar.translate(MappingMode::Rpcs3, false) else {
            panic!("expected xbox report");
        };
        assert_eq!(vigem.right_thumb_y, 0);
        assert_eq!(rpcs3.right_thumb_y, i16::MIN);
    }

    #[test]
    fn riffmaster_joystick_drives_left_stick() {
        let mut data = vec![0u8; GuitarInput::JOYSTICK_SIZE];
        data[7..9].copy_from_slice(&1234i16.to_le_bytes());
        data[9..11].copy_from_slice(&(-4321i16).to_le_bytes());
        let guitar = GuitarInput::parse(&data, true).unwrap();
        assert_eq!(guitar.joystick, Some((1234, -4321)));

        let ControllerReport::Xbox(report) =
            InstrumentInput::Guitar(guitar).translate(MappingMode::ViGEm, false)
        else {
            panic!("expected xbox report");
        };
        assert_eq!((report.left_thumb_x, report.left_thumb_y), (1234, -4321));
    }

    #[test]
    fn drum_pads_and_cymbals() {
        let data = [0x00, 0x00, 0xF0, 0x00, 0x0F, 0x00];
        let drums = DrumInput::parse(&data).unwrap();
        assert_eq!(drums.red_pad, 0x0F);
        assert_eq!(drums.blue_cymbal, 0x0F);

        let ControllerReport::Xbox(report) =
            InstrumentInput::Drums(drums).translate(MappingMode::ViGEm, false)
        else {
            panic!("expected xbox report");
        };
        assert!(report.buttons.contains(XboxButtons::B | XboxButtons::X));
        assert!(report.buttons.contains(XboxButtons::RIGHT_THUMB));
        assert!(report.buttons.contains(XboxButtons::RIGHT_SHOULDER));
        assert_eq!(report.left_thumb_x, i16::MAX);
    }

    #[test]
    fn ghl_strum_maps_to_dpad() {
        let up = GhlInput::parse(&[0x00, 0x00, 0x08, 0x00, 0x80, 0x80]).unwrap();
        let ControllerReport::Xbox(report) =
            InstrumentInput::Ghl(up).translate(MappingMode::ViGEm, false)
        else {
            panic!("expected xbox report");
        };
        assert!(report.buttons.contains(XboxButtons::DPAD_UP | XboxButtons::A));
        assert!(!report.buttons.contains(XboxButtons::DPAD_DOWN));
    }

    #[test]
    fn vjoy_buttons_follow_bit_index() {
        let guitar = GuitarInput::parse(&[0x10, 0x00, 0, 0, 0, 0x01, 0x00], false).unwrap();
        let ControllerReport::Joystick(report) =
            InstrumentInput::Guitar(guitar).translate(MappingMode::VJoy, true)
        else {
            panic!("expected joystick report");
        };
        // GIP A is bit 4, green fret lands on bit 16
        assert!(report.button(5));
        assert!(report.button(17));
        assert!(report.button(JOYSTICK_GUIDE_BUTTON));
    }

    #[test]
    fn guide_sets_xbox_guide_bit() {
        let ControllerReport::Xbox(report) =
            InstrumentInput::default().translate(MappingMode::Rpcs3, true)
        else {
            panic!("expected xbox report");
        };
        assert_eq!(report.buttons, XboxButtons::GUIDE);
    }

    #[test]
    fn axis_scaling_endpoints() {
        assert_eq!(byte_to_axis(0), i16::MIN);
        assert_eq!(byte_to_axis(0xFF), i16::MAX);
        assert_eq!(byte_to_half_axis(0xFF), i16::MAX);
        assert_eq!(nibble_to_axis(0), 0);
        assert_eq!(trigger_to_byte(0xFFFF), 0xFF);
    }
}
