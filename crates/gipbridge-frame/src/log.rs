//! Textual packet log.
//!
//! One packet per line, in either direction:
//! ```text
//! [2024-03-01 18:22:05.113] [09] -> 20 00 0B 05 | 00 10 20 30 40
//! ```
//! The `[timestamp] [length]` prefix, the arrow and the `| data` part are all
//! optional when reading, so logs can be written by hand. A missing arrow means
//! inbound.

use std::fmt;

use chrono::{Local, NaiveDateTime};

use crate::codec::{decode_header, CommandHeader};
use crate::error::{FrameError, Result};

const IN_ARROW: &str = "->";
const OUT_ARROW: &str = "<-";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Which way a logged packet travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device to host.
    In,
    /// Host to device.
    Out,
}

impl Direction {
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::In => IN_ARROW,
            Direction::Out => OUT_ARROW,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::In => "in",
            Direction::Out => "out",
        })
    }
}

/// One parsed packet log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedPacket {
    pub header: Vec<u8>,
    pub data: Vec<u8>,
    pub direction: Direction,
}

impl LoggedPacket {
    /// Decode the header bytes; they must form exactly one header.
    pub fn command_header(&self) -> Result<CommandHeader> {
        let (header, consumed) = decode_header(&self.header)?;
        if consumed != self.header.len() {
            return Err(FrameError::InvalidLogLine(format!(
                "{} stray bytes after command header",
                self.header.len() - consumed
            )));
        }
        Ok(header)
    }

    /// Format as a log line stamped with the current local time.
    pub fn to_line(&self) -> String {
        format_packet(&self.header, &self.data, self.direction)
    }
}

/// Format one packet as a log line stamped with the current local time.
pub fn format_packet(header: &[u8], data: &[u8], direction: Direction) -> String {
    format_packet_at(header, data, direction, Local::now().naive_local())
}

/// Format one packet as a log line with an explicit timestamp.
pub fn format_packet_at(
    header: &[u8],
    data: &[u8],
    direction: Direction,
    timestamp: NaiveDateTime,
) -> String {
    let line = format!(
        "[{}] [{:02}] {} {} | {}",
        timestamp.format(TIMESTAMP_FORMAT),
        header.len() + data.len(),
        direction.arrow(),
        to_hex(header),
        to_hex(data),
    );
    line.trim_end().to_string()
}

/// Parse one log line.
pub fn parse_packet(line: &str) -> Result<LoggedPacket> {
    let mut input = line.trim();
    if input.is_empty() {
        return Err(FrameError::InvalidLogLine("empty line".to_string()));
    }

    // Timestamp and length prefix
    if let Some(bracket) = input.rfind(']') {
        input = input[bracket + 1..].trim_start();
    }

    let mut direction = Direction::In;
    if let Some(rest) = input.strip_prefix(IN_ARROW) {
        input = rest.trim_start();
    } else if let Some(rest) = input.strip_prefix(OUT_ARROW) {
        direction = Direction::Out;
        input = rest.trim_start();
    }

    let (header_text, data_text) = match input.rfind('|') {
        Some(separator) => (&input[..separator], &input[separator + 1..]),
        None => (input, ""),
    };

    let header = parse_hex(header_text)?;
    if header.is_empty() {
        return Err(FrameError::InvalidLogLine(format!(
            "no header bytes in '{line}'"
        )));
    }

    Ok(LoggedPacket {
        header,
        data: parse_hex(data_text)?,
        direction,
    })
}

/// Strip a trailing `//` comment and surrounding whitespace.
pub fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(start) => line[..start].trim(),
        None => line.trim(),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let encoded = hex::encode_upper(bytes);
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, pair) in encoded.as_bytes().chunks(2).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.extend(pair.iter().map(|b| char::from(*b)));
    }
    out
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    hex::decode(&compact)
        .map_err(|err| FrameError::InvalidLogLine(format!("bad hex '{}': {err}", text.trim())))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(18, 22, 5, 113)
            .unwrap()
    }

    #[test]
    fn formats_inbound_line() {
        let line = format_packet_at(
            &[0x20, 0x00, 0x0B, 0x05],
            &[0x00, 0x10, 0x20, 0x30, 0x40],
            Direction::In,
            timestamp(),
        );
        assert_eq!(
            line,
            "[2024-03-01 18:22:05.113] [09] -> 20 00 0B 05 | 00 10 20 30 40"
        );
    }

    #[test]
    fn inbound_line_roundtrip() {
        let header = [0x20, 0x00, 0x0B, 0x05];
        let data = [0x00, 0x10, 0x20, 0x30, 0x40];
        let line = format_packet_at(&header, &data, Direction::In, timestamp());

        let parsed = parse_packet(&line).unwrap();
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.data, data);
        assert_eq!(parsed.direction, Direction::In);
    }

    #[test]
    fn outbound_line_roundtrip() {
        let header = [0x05, 0x20, 0x01, 0x01];
        let data = [0x00];
        let line = format_packet(&header, &data, Direction::Out);

        let parsed = parse_packet(&line).unwrap();
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.data, data);
        assert_eq!(parsed.direction, Direction::Out);
    }

    #[test]
    fn empty_payload_has_no_trailing_space() {
        let line = format_packet_at(&[0x04, 0x20, 0x01, 0x00], &[], Direction::Out, timestamp());
        assert!(line.ends_with("<- 04 20 01 00 |"));

        let parsed = parse_packet(&line).unwrap();
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn hand_written_line_defaults_to_inbound() {
        let parsed = parse_packet("02 20 01 1C | 00 11").unwrap();
        assert_eq!(parsed.direction, Direction::In);
        assert_eq!(parsed.header, vec![0x02, 0x20, 0x01, 0x1C]);
        assert_eq!(parsed.data, vec![0x00, 0x11]);
    }

    #[test]
    fn header_only_line() {
        let parsed = parse_packet("<- 04 20 01 00").unwrap();
        assert_eq!(parsed.direction, Direction::Out);
        assert!(parsed.data.is_empty());
        assert_eq!(parsed.command_header().unwrap().command_id, 0x04);
    }

    #[test]
    fn dash_separated_bytes() {
        let parsed = parse_packet("[12] 20-00-01-02 | AA-BB").unwrap();
        assert_eq!(parsed.header, vec![0x20, 0x00, 0x01, 0x02]);
        assert_eq!(parsed.data, vec![0xAA, 0xBB]);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(matches!(
            parse_packet("20 00 0G 01"),
            Err(FrameError::InvalidLogLine(_))
        ));
        assert!(parse_packet("20 00 0").is_err());
    }

    #[test]
    fn rejects_empty_line() {
        assert!(parse_packet("   ").is_err());
        assert!(parse_packet("[2024-03-01] [00] ->").is_err());
    }

    #[test]
    fn command_header_rejects_stray_bytes() {
        let parsed = parse_packet("20 00 01 00 FF").unwrap();
        assert!(matches!(
            parsed.command_header(),
            Err(FrameError::InvalidLogLine(_))
        ));
    }

    #[test]
    fn strips_comments() {
        assert_eq!(strip_comment("20 00 01 00 // input"), "20 00 01 00");
        assert_eq!(strip_comment("// only a comment"), "");
        assert_eq!(strip_comment("  20 00  "), "20 00");
    }
}
