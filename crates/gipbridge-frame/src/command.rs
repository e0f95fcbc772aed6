//! Command ids.
//!
//! System commands (sent with the `SystemCommand` flag) negotiate the device
//! lifecycle. Everything else is instrument-specific and handed to the mapper.

/// Acknowledgement of a message that requested one.
pub const ACKNOWLEDGEMENT: u8 = 0x01;

/// A client announcing itself (serial, vendor id, product id, versions).
pub const ARRIVAL: u8 = 0x02;

/// Periodic connectivity and battery status.
pub const STATUS: u8 = 0x03;

/// Capability descriptor (request when sent, manifest when received).
pub const DESCRIPTOR: u8 = 0x04;

/// Device configuration: power on, power off, reset.
pub const CONFIGURATION: u8 = 0x05;

/// Authentication handshake.
pub const AUTHENTICATION: u8 = 0x06;

/// Discrete key events, including the guide button.
pub const KEYSTROKE: u8 = 0x07;

/// Guide button LED control.
pub const LED: u8 = 0x0A;

/// Gamepad rumble output.
pub const GAMEPAD_RUMBLE: u8 = 0x09;

/// Main input report.
pub const INPUT: u8 = 0x20;

/// Returns a human-readable name for a command id.
pub fn command_name(id: u8, system: bool) -> &'static str {
    if !system {
        return match id {
            INPUT => "INPUT",
            GAMEPAD_RUMBLE => "RUMBLE",
            _ => "DEVICE",
        };
    }

    match id {
        ACKNOWLEDGEMENT => "ACKNOWLEDGEMENT",
        ARRIVAL => "ARRIVAL",
        STATUS => "STATUS",
        DESCRIPTOR => "DESCRIPTOR",
        CONFIGURATION => "CONFIGURATION",
        AUTHENTICATION => "AUTHENTICATION",
        KEYSTROKE => "KEYSTROKE",
        LED => "LED",
        _ => "SYSTEM",
    }
}
