use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use gipbridge_frame::{
    encode_packet, next_sequence, parse_packet, strip_comment, Direction, Outcome,
};
use gipbridge_mapper::{BackendSet, InMemoryBackend, MapperConfig, MapperFactory, MappingMode};
use gipbridge_session::{DeviceRouter, SessionConfig, SessionError};
use gipbridge_transport::{RecordingSink, TransportKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cmd::ReplayArgs;
use crate::exit::{
    io_error, session_error, CliError, CliResult, DATA_INVALID, FAILURE, INTERNAL, SUCCESS,
    USAGE,
};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Debug, Serialize)]
struct ClientSummary {
    client_id: u8,
    vendor_id: Option<String>,
    product_id: Option<String>,
    mapper: Option<String>,
}

#[derive(Debug, Serialize)]
struct StopSummary {
    line: usize,
    reason: String,
}

#[derive(Debug, Serialize)]
struct ReplaySummary {
    log: String,
    mapping_mode: MappingMode,
    packets: usize,
    skipped_outbound: usize,
    sent: usize,
    controllers_created: u32,
    reports: usize,
    clients: Vec<ClientSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stopped: Option<StopSummary>,
    interrupted: bool,
}

/// What feeding one log line did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Blank,
    Outbound,
    Handled(Outcome),
}

/// Drives a simulated device from packet log lines.
struct Replayer {
    router: DeviceRouter<RecordingSink>,
    sink: RecordingSink,
    xbox: InMemoryBackend,
    joystick: InMemoryBackend,
    mode: MappingMode,
    /// Last sequence assigned per `(client, command)` to lines logged without one.
    sequences: HashMap<(u8, u8), u8>,
    packets: usize,
    skipped_outbound: usize,
}

impl Replayer {
    fn new(mapper: MapperConfig, capacity: usize, log_packets: bool) -> Self {
        let (backends, xbox, joystick) = BackendSet::in_memory(capacity);
        let sink = RecordingSink::new();
        let config = SessionConfig {
            log_packets,
            ..SessionConfig::default()
        };
        let router = DeviceRouter::with_config(
            sink.clone(),
            TransportKind::Replay,
            MapperFactory::new(backends, mapper),
            config,
        );
        Self {
            router,
            sink,
            xbox,
            joystick,
            mode: mapper.mode,
            sequences: HashMap::new(),
            packets: 0,
            skipped_outbound: 0,
        }
    }

    fn feed(&mut self, line: &str) -> Result<Step, SessionError> {
        let text = strip_comment(line).trim();
        if text.is_empty() {
            return Ok(Step::Blank);
        }

        let packet = parse_packet(text)?;
        if packet.direction == Direction::Out {
            self.skipped_outbound += 1;
            return Ok(Step::Outbound);
        }

        let mut header = packet.command_header()?;
        // Hand-written and vendor-API logs often carry neither.
        header.data_length = packet.data.len();
        if header.sequence == 0 {
            let previous = self
                .sequences
                .entry((header.client_id, header.command_id))
                .or_insert(0);
            *previous = next_sequence(*previous);
            header.sequence = *previous;
        }

        let mut raw = BytesMut::new();
        encode_packet(&header, &packet.data, &mut raw)?;
        let outcome = self.router.handle_packet(&raw)?;
        self.packets += 1;
        Ok(Step::Handled(outcome))
    }

    fn finish(self, log: &Path, interrupted: bool, stopped: Option<StopSummary>) -> ReplaySummary {
        let clients = self
            .router
            .clients()
            .map(|session| ClientSummary {
                client_id: session.client_id(),
                vendor_id: session.arrival().map(|a| format!("{:04X}", a.vendor_id)),
                product_id: session.arrival().map(|a| format!("{:04X}", a.product_id)),
                mapper: session.mapper_name().map(str::to_string),
            })
            .collect();

        let summary = ReplaySummary {
            log: log.display().to_string(),
            mapping_mode: self.mode,
            packets: self.packets,
            skipped_outbound: self.skipped_outbound,
            sent: self.sink.packets().len(),
            controllers_created: self.xbox.created() + self.joystick.created(),
            reports: self.xbox.report_count() + self.joystick.report_count(),
            clients,
            stopped,
            interrupted,
        };

        self.router.shutdown();
        summary
    }
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let mapper = load_mapper_config(&args)?;
    let file = File::open(&args.path)
        .map_err(|err| io_error(&format!("cannot open {}", args.path.display()), err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    info!(log = %args.path.display(), mode = %mapper.mode, "replaying packet log");
    let mut replayer = Replayer::new(mapper, args.capacity, args.log_packets);
    let mut failure: Option<(usize, CliError)> = None;
    let mut interrupted = false;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            warn!("replay interrupted");
            interrupted = true;
            break;
        }

        let line_no = index + 1;
        let step = line
            .map_err(|err| io_error("read failed", err))
            .and_then(|line| {
                replayer
                    .feed(&line)
                    .map_err(|err| session_error("cannot replay packet", err))
            });

        match step {
            Ok(Step::Handled(Outcome::Success | Outcome::Pending)) => {}
            Ok(Step::Handled(outcome)) => {
                failure = Some((
                    line_no,
                    CliError::new(DATA_INVALID, format!("device returned {outcome}")),
                ));
                break;
            }
            Ok(Step::Outbound) => debug!(line = line_no, "skipping outbound packet"),
            Ok(Step::Blank) => {}
            Err(err) => {
                failure = Some((line_no, err));
                break;
            }
        }
    }

    let stopped = failure.as_ref().map(|(line, err)| StopSummary {
        line: *line,
        reason: err.message.clone(),
    });
    let summary = replayer.finish(&args.path, interrupted, stopped);
    print_summary(&summary, format);

    match failure {
        Some((line, err)) => Err(CliError::new(
            err.code,
            format!("line {line}: {}", err.message),
        )),
        None if interrupted => Ok(FAILURE),
        None => Ok(SUCCESS),
    }
}

fn load_mapper_config(args: &ReplayArgs) -> CliResult<MapperConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
            serde_json::from_str(&text).map_err(|err| {
                CliError::new(USAGE, format!("invalid config {}: {err}", path.display()))
            })?
        }
        None => MapperConfig::default(),
    };

    if let Some(mode) = args.mapping_mode {
        config.mode = mode;
    }
    if args.allow_gamepads {
        config.allow_gamepads = true;
    }
    Ok(config)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn print_summary(out: &ReplaySummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            print_table(
                vec!["LOG", "MODE", "PACKETS", "SKIPPED", "SENT", "CONTROLLERS", "REPORTS"],
                [vec![
                    out.log.clone(),
                    out.mapping_mode.to_string(),
                    out.packets.to_string(),
                    out.skipped_outbound.to_string(),
                    out.sent.to_string(),
                    out.controllers_created.to_string(),
                    out.reports.to_string(),
                ]],
            );
            if !out.clients.is_empty() {
                print_table(
                    vec!["CLIENT", "VENDOR", "PRODUCT", "MAPPER"],
                    out.clients.iter().map(|client| {
                        vec![
                            client.client_id.to_string(),
                            client.vendor_id.clone().unwrap_or_else(|| "-".to_string()),
                            client.product_id.clone().unwrap_or_else(|| "-".to_string()),
                            client.mapper.clone().unwrap_or_else(|| "-".to_string()),
                        ]
                    }),
                );
            }
            if let Some(stop) = &out.stopped {
                println!("stopped at line {}: {}", stop.line, stop.reason);
            }
        }
        OutputFormat::Pretty => {
            println!("Replay of {} ({}):", out.log, out.mapping_mode);
            println!("  Packets:     {} ({} outbound skipped)", out.packets, out.skipped_outbound);
            println!("  Sent:        {}", out.sent);
            println!("  Controllers: {}", out.controllers_created);
            println!("  Reports:     {}", out.reports);
            for client in &out.clients {
                println!(
                    "  Client {}:    {}:{} via {}",
                    client.client_id,
                    client.vendor_id.as_deref().unwrap_or("????"),
                    client.product_id.as_deref().unwrap_or("????"),
                    client.mapper.as_deref().unwrap_or("no mapper")
                );
            }
            if let Some(stop) = &out.stopped {
                println!("  Stopped:     line {}: {}", stop.line, stop.reason);
            }
            if out.interrupted {
                println!("  Interrupted");
            }
        }
    }
}
