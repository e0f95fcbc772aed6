use gipbridge_frame::command::command_name;
use gipbridge_frame::{parse_packet, strip_comment, LoggedPacket};
use serde::Serialize;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{flag_names, hex_bytes, print_json, print_table, OutputFormat};

#[derive(Debug, Serialize)]
struct DecodedPacket {
    direction: String,
    command_id: u8,
    command: &'static str,
    client_id: u8,
    flags: Vec<&'static str>,
    sequence: u8,
    data_length: usize,
    data_received: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk_index: Option<u32>,
    data: String,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let line = strip_comment(&args.line).trim();
    if line.is_empty() {
        return Err(CliError::new(USAGE, "nothing to decode"));
    }

    let packet = parse_packet(line).map_err(|err| frame_error("parse failed", err))?;
    let decoded = decode(&packet)?;
    print_decoded(&decoded, format);
    Ok(SUCCESS)
}

fn decode(packet: &LoggedPacket) -> CliResult<DecodedPacket> {
    let header = packet
        .command_header()
        .map_err(|err| frame_error("invalid command header", err))?;

    Ok(DecodedPacket {
        direction: packet.direction.to_string(),
        command_id: header.command_id,
        command: command_name(header.command_id, header.is_system()),
        client_id: header.client_id,
        flags: flag_names(header.flags),
        sequence: header.sequence,
        data_length: header.data_length,
        data_received: packet.data.len(),
        chunk_index: header.is_chunked().then_some(header.chunk_index),
        data: hex_bytes(&packet.data),
    })
}

fn print_decoded(out: &DecodedPacket, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut rows = vec![
                vec!["direction".to_string(), out.direction.clone()],
                vec![
                    "command".to_string(),
                    format!("{:#04x} ({})", out.command_id, out.command),
                ],
                vec!["client".to_string(), out.client_id.to_string()],
                vec!["flags".to_string(), out.flags.join(" | ")],
                vec!["sequence".to_string(), out.sequence.to_string()],
                vec![
                    "length".to_string(),
                    format!("{} (received {})", out.data_length, out.data_received),
                ],
            ];
            if let Some(index) = out.chunk_index {
                rows.push(vec!["chunk index".to_string(), index.to_string()]);
            }
            rows.push(vec!["data".to_string(), out.data.clone()]);
            print_table(vec!["FIELD", "VALUE"], rows);
        }
        OutputFormat::Pretty => {
            print!(
                "{} cmd={:#04x} ({}) client={} seq={} len={}/{}",
                out.direction,
                out.command_id,
                out.command,
                out.client_id,
                out.sequence,
                out.data_received,
                out.data_length
            );
            if !out.flags.is_empty() {
                print!(" flags={}", out.flags.join("|"));
            }
            if let Some(index) = out.chunk_index {
                print!(" chunk={index}");
            }
            println!();
        }
    }
}
