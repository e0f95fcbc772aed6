//! Capability descriptor parsing.
//!
//! Layout (little-endian):
//! ```text
//! 0x00  u16  header length (>= 0x20)
//! 0x02       reserved
//! 0x10  u16  offset: external commands    (count, 1 byte each)
//! 0x12  u16  offset: firmware versions    (count, 2x u16 each)
//! 0x14  u16  offset: audio formats        (count, 2 bytes each)
//! 0x16  u16  offset: input commands       (count, 1 byte each)
//! 0x18  u16  offset: output commands      (count, 1 byte each)
//! 0x1A  u16  offset: class names          (count, u16 length + ASCII each)
//! 0x1C  u16  offset: interface GUIDs      (count, 16 bytes each)
//! 0x1E  u16  offset: HID descriptor       (u16 length + bytes)
//! ```
//! An offset of zero means the element is absent.

use std::collections::BTreeSet;

use bytes::{BufMut, BytesMut};
use uuid::Uuid;

use crate::error::{FrameError, Result};

const OFFSET_TABLE: usize = 0x10;
const HEADER_LEN: usize = 0x20;
const GUID_SIZE: usize = 16;

const EXTERNAL_COMMANDS: usize = 0;
const FIRMWARE_VERSIONS: usize = 1;
const AUDIO_FORMATS: usize = 2;
const INPUT_COMMANDS: usize = 3;
const OUTPUT_COMMANDS: usize = 4;
const CLASS_NAMES: usize = 5;
const INTERFACE_GUIDS: usize = 6;
const HID_DESCRIPTOR: usize = 7;

/// A client's capability manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Descriptor {
    pub external_commands: Vec<u8>,
    /// `(major, minor)` pairs.
    pub firmware_versions: Vec<(u16, u16)>,
    /// `(input, output)` format ids.
    pub audio_formats: Vec<(u8, u8)>,
    pub input_commands: BTreeSet<u8>,
    pub output_commands: BTreeSet<u8>,
    pub class_names: Vec<String>,
    /// Advertised interface ids, in device order without duplicates.
    pub interface_guids: Vec<Uuid>,
    pub hid_descriptor: Vec<u8>,
}

impl Descriptor {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(invalid(format!(
                "{} bytes is shorter than the descriptor header",
                data.len()
            )));
        }

        let header_len = read_u16(data, 0) as usize;
        if !(HEADER_LEN..=data.len()).contains(&header_len) {
            return Err(invalid(format!("bad header length {header_len:#x}")));
        }

        let offset = |element: usize| read_u16(data, OFFSET_TABLE + element * 2) as usize;

        let mut descriptor = Descriptor {
            external_commands: fixed_items(data, offset(EXTERNAL_COMMANDS), 1)?
                .map(|item| item[0])
                .collect(),
            firmware_versions: fixed_items(data, offset(FIRMWARE_VERSIONS), 4)?
                .map(|item| (read_u16(item, 0), read_u16(item, 2)))
                .collect(),
            audio_formats: fixed_items(data, offset(AUDIO_FORMATS), 2)?
                .map(|item| (item[0], item[1]))
                .collect(),
            input_commands: fixed_items(data, offset(INPUT_COMMANDS), 1)?
                .map(|item| item[0])
                .collect(),
            output_commands: fixed_items(data, offset(OUTPUT_COMMANDS), 1)?
                .map(|item| item[0])
                .collect(),
            class_names: class_names(data, offset(CLASS_NAMES))?,
            interface_guids: Vec::new(),
            hid_descriptor: hid_descriptor(data, offset(HID_DESCRIPTOR))?,
        };

        for item in fixed_items(data, offset(INTERFACE_GUIDS), GUID_SIZE)? {
            let mut bytes = [0u8; GUID_SIZE];
            bytes.copy_from_slice(item);
            let guid = Uuid::from_bytes_le(bytes);
            if !descriptor.interface_guids.contains(&guid) {
                descriptor.interface_guids.push(guid);
            }
        }

        Ok(descriptor)
    }

    /// Whether the client accepts `command` from the host.
    pub fn supports_output(&self, command: u8) -> bool {
        self.output_commands.contains(&command)
    }

    /// Serialize into the descriptor layout.
    ///
    /// Empty elements are written as absent.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = BytesMut::new();
        let mut offsets = [0u16; 8];
        let mut place = |element: usize, body: &mut BytesMut| {
            offsets[element] = (HEADER_LEN + body.len()) as u16;
        };

        if !self.external_commands.is_empty() {
            place(EXTERNAL_COMMANDS, &mut body);
            body.put_u8(self.external_commands.len() as u8);
            body.put_slice(&self.external_commands);
        }
        if !self.firmware_versions.is_empty() {
            place(FIRMWARE_VERSIONS, &mut body);
            body.put_u8(self.firmware_versions.len() as u8);
            for (major, minor) in &self.firmware_versions {
                body.put_u16_le(*major);
                body.put_u16_le(*minor);
            }
        }
        if !self.audio_formats.is_empty() {
            place(AUDIO_FORMATS, &mut body);
            body.put_u8(self.audio_formats.len() as u8);
            for (input, output) in &self.audio_formats {
                body.put_u8(*input);
                body.put_u8(*output);
            }
        }
        if !self.input_commands.is_empty() {
            place(INPUT_COMMANDS, &mut body);
            body.put_u8(self.input_commands.len() as u8);
            body.extend(self.input_commands.iter().copied());
        }
        if !self.output_commands.is_empty() {
            place(OUTPUT_COMMANDS, &mut body);
            body.put_u8(self.output_commands.len() as u8);
            body.extend(self.output_commands.iter().copied());
        }
        if !self.class_names.is_empty() {
            place(CLASS_NAMES, &mut body);
            body.put_u8(self.class_names.len() as u8);
            for name in &self.class_names {
                body.put_u16_le(name.len() as u16);
                body.put_slice(name.as_bytes());
            }
        }
        if !self.interface_guids.is_empty() {
            place(INTERFACE_GUIDS, &mut body);
            body.put_u8(self.interface_guids.len() as u8);
            for guid in &self.interface_guids {
                body.put_slice(&guid.to_bytes_le());
            }
        }
        if !self.hid_descriptor.is_empty() {
            place(HID_DESCRIPTOR, &mut body);
            body.put_u16_le(self.hid_descriptor.len() as u16);
            body.put_slice(&self.hid_descriptor);
        }

        let mut out = BytesMut::with_capacity(HEADER_LEN + body.len());
        out.put_u16_le(HEADER_LEN as u16);
        out.put_bytes(0, OFFSET_TABLE - 2);
        for offset in offsets {
            out.put_u16_le(offset);
        }
        out.put_slice(&body);
        out.to_vec()
    }
}

fn invalid(reason: String) -> FrameError {
    FrameError::InvalidDescriptor(reason)
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn fixed_items(
    data: &[u8],
    offset: usize,
    item_size: usize,
) -> Result<std::slice::ChunksExact<'_, u8>> {
    if offset == 0 {
        return Ok(data[..0].chunks_exact(item_size));
    }

    let count = *data
        .get(offset)
        .ok_or_else(|| invalid(format!("element offset {offset:#x} out of range")))?
        as usize;
    let start = offset + 1;
    let items = data
        .get(start..start + count * item_size)
        .ok_or_else(|| invalid(format!("element at {offset:#x} overruns descriptor")))?;
    Ok(items.chunks_exact(item_size))
}

fn class_names(data: &[u8], offset: usize) -> Result<Vec<String>> {
    if offset == 0 {
        return Ok(Vec::new());
    }

    let count = *data
        .get(offset)
        .ok_or_else(|| invalid(format!("class name offset {offset:#x} out of range")))?;
    let mut pos = offset + 1;
    let mut names = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len_bytes = data
            .get(pos..pos + 2)
            .ok_or_else(|| invalid("class name length overruns descriptor".to_string()))?;
        let len = read_u16(len_bytes, 0) as usize;
        pos += 2;
        let name = data
            .get(pos..pos + len)
            .ok_or_else(|| invalid("class name overruns descriptor".to_string()))?;
        names.push(String::from_utf8_lossy(name).into_owned());
        pos += len;
    }
    Ok(names)
}

fn hid_descriptor(data: &[u8], offset: usize) -> Result<Vec<u8>> {
    if offset == 0 {
        return Ok(Vec::new());
    }

    let len_bytes = data
        .get(offset..offset + 2)
        .ok_or_else(|| invalid(format!("HID descriptor offset {offset:#x} out of range")))?;
    let len = read_u16(len_bytes, 0) as usize;
    let start = offset + 2;
    data.get(start..start + len)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| invalid("HID descriptor overruns descriptor".to_string()))
}
