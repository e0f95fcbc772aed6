use clap::{Args, Subcommand};
use gipbridge_mapper::MappingMode;
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a packet log through a simulated device.
    Replay(ReplayArgs),
    /// Decode the command header of one packet log line.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    /// Whether per-packet logging was requested.
    pub fn log_packets(&self) -> bool {
        matches!(self, Command::Replay(args) if args.log_packets)
    }
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Replay(args) => replay::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Packet log to replay.
    pub path: PathBuf,
    /// Virtual controller backend (vigem, vjoy, rpcs3). Overrides --config.
    #[arg(long, value_name = "MODE", env = "GIPBRIDGE_MAPPING_MODE")]
    pub mapping_mode: Option<MappingMode>,
    /// Map standard gamepads as well as instruments. Overrides --config.
    #[arg(long)]
    pub allow_gamepads: bool,
    /// JSON mapper settings file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log every packet in both directions.
    #[arg(long, env = "GIPBRIDGE_LOG_PACKETS")]
    pub log_packets: bool,
    /// Virtual controller slots per backend.
    #[arg(long, default_value = "4")]
    pub capacity: usize,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Packet log line, e.g. "-> 20 00 01 02 | 10 00".
    pub line: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
