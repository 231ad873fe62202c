use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[cfg(feature = "live")]
use airtap_core::capture::Live;
use airtap_core::capture::{Capture, CaptureEvent, Replay};
use airtap_core::config::{LiveOptions, ReplayOptions, SaveOptions};
use airtap_core::protocols::decode_frame;
use airtap_core::sink::{PcapFileWriter, Save};
use airtap_core::source::Reader;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glob::glob;
use log::{LevelFilter, debug, info, warn};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const LONG_VERSION: &str = env!("AIRTAP_LONG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "airtap")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Capture 802.11 traffic from a device or capture file and print one JSON line per packet.",
    long_about = None,
    after_help = "Examples:\n  airtap replay capture.pcap --decode\n  airtap replay 'captures/*.pcapng' --limit 10\n  airtap live wlan0mon --monitor --save out.pcap"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a .pcap or .pcapng file.
    Replay {
        /// Path (or glob pattern matching one file) of the capture
        input: PathBuf,

        /// Shared buffer size in bytes
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Maximum packets per fetch
        #[arg(long)]
        batch_size: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Capture from a network device (requires the `live` feature).
    Live {
        /// Device name, e.g. wlan0mon
        device: String,

        /// Enable monitor (rfmon) mode
        #[arg(long)]
        monitor: bool,

        /// Enable promiscuous mode
        #[arg(long)]
        promisc: bool,

        /// BPF filter expression
        #[arg(long)]
        filter: Option<String>,

        /// Snapshot length in bytes
        #[arg(long)]
        snap_len: Option<usize>,

        /// Shared buffer size in bytes
        #[arg(long)]
        buffer_size: Option<usize>,

        /// Maximum packets per fetch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Device read timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Decode each packet according to the capture's data-link type
    #[arg(long)]
    decode: bool,

    /// Include captured bytes as hex
    #[arg(long)]
    hex: bool,

    /// Also save packets to a .pcap file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Stop after this many packets
    #[arg(long)]
    limit: Option<u64>,

    /// JSON file with `capture` and `save` option objects
    #[arg(long)]
    options: Option<PathBuf>,

    /// Pretty-print each JSON record
    #[arg(long)]
    pretty: bool,

    /// Suppress the summary on stderr
    #[arg(long)]
    quiet: bool,
}

/// Layout of an `--options` file. Both sections are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplayOptionsFile {
    capture: ReplayOptions,
    save: SaveOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
#[cfg_attr(not(feature = "live"), allow(dead_code))]
struct LiveOptionsFile {
    capture: LiveOptions,
    save: SaveOptions,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Replay {
            input,
            buffer_size,
            batch_size,
            output,
        } => cmd_replay(input, buffer_size, batch_size, output),
        Commands::Live {
            device,
            monitor,
            promisc,
            filter,
            snap_len,
            buffer_size,
            batch_size,
            timeout_ms,
            output,
        } => {
            let overrides = LiveOverrides {
                monitor,
                promisc,
                filter,
                snap_len,
                buffer_size,
                batch_size,
                timeout_ms,
            };
            cmd_live(device, overrides, output)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if verbose > 0 {
        builder.filter_level(level);
    }
    builder.init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

fn cmd_replay(
    input: PathBuf,
    buffer_size: Option<usize>,
    batch_size: Option<usize>,
    output: OutputArgs,
) -> Result<(), CliError> {
    let resolved_input = resolve_input_path(&input)?;
    validate_input_file(&resolved_input)?;
    if let Some(save) = output.save.as_deref() {
        ensure_distinct_output(&resolved_input, save)?;
    }

    let file: ReplayOptionsFile = load_options(output.options.as_deref())?;
    let mut options = file.capture;
    if let Some(size) = buffer_size {
        options.buffer_size = size;
    }
    if let Some(size) = batch_size {
        options.batch_size = size;
    }
    debug!("replay options: {options:?}");

    let capture = Replay::open(&resolved_input, &options)
        .with_context(|| format!("failed to open capture: {}", resolved_input.display()))?;
    run(capture, &file.save, &output, tokio::signal::ctrl_c())
}

struct LiveOverrides {
    monitor: bool,
    promisc: bool,
    filter: Option<String>,
    snap_len: Option<usize>,
    buffer_size: Option<usize>,
    batch_size: Option<usize>,
    timeout_ms: Option<u64>,
}

impl LiveOverrides {
    fn apply(self, options: &mut LiveOptions) {
        options.monitor |= self.monitor;
        options.promisc |= self.promisc;
        if let Some(filter) = self.filter {
            options.filter = filter;
        }
        if let Some(snap_len) = self.snap_len {
            options.snap_len = snap_len;
        }
        if let Some(size) = self.buffer_size {
            options.buffer_size = size;
        }
        if let Some(size) = self.batch_size {
            options.batch_size = size;
        }
        if let Some(timeout) = self.timeout_ms {
            options.timeout_ms = timeout;
        }
    }
}

#[cfg(feature = "live")]
fn cmd_live(device: String, overrides: LiveOverrides, output: OutputArgs) -> Result<(), CliError> {
    let file: LiveOptionsFile = load_options(output.options.as_deref())?;
    let mut options = file.capture;
    overrides.apply(&mut options);
    debug!("live options: {options:?}");

    let capture = Live::open(&device, &options).map_err(|err| {
        CliError::new(
            format!("failed to open device {device}: {err}"),
            Some("check the device name and capture permissions".to_string()),
        )
    })?;
    run(capture, &file.save, &output, tokio::signal::ctrl_c())
}

#[cfg(not(feature = "live"))]
fn cmd_live(device: String, overrides: LiveOverrides, output: OutputArgs) -> Result<(), CliError> {
    // Still validate the options so a bad file is reported first.
    let file: LiveOptionsFile = load_options(output.options.as_deref())?;
    let mut options = file.capture;
    overrides.apply(&mut options);
    debug!("live options: {options:?}");
    Err(CliError::new(
        format!("live capture on {device} is not available in this build"),
        Some("rebuild with `--features live` (requires libpcap)".to_string()),
    ))
}

fn load_options<T>(path: Option<&Path>) -> Result<T, CliError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = fs::read_to_string(path).map_err(|err| {
        CliError::new(
            format!("failed to read options file {}: {err}", path.display()),
            Some("pass a JSON file with `capture` and `save` objects".to_string()),
        )
    })?;
    serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            format!("invalid options file {}: {err}", path.display()),
            Some("unknown keys are ignored; check value types".to_string()),
        )
    })
}

/// One output line.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PacketRecord<'a> {
    index: u64,
    timestamp: String,
    len: usize,
    orig_len: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<airtap_core::Decoded<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decode_error: Option<String>,
}

#[derive(Debug, Default)]
struct Summary {
    packets: u64,
    saved: u64,
    errors: u64,
}

/// Pump the capture to stdout until it ends, the limit is reached or `stop`
/// resolves, then close it and finish the saved file.
fn run<R: Reader>(
    mut capture: Capture<R>,
    save_options: &SaveOptions,
    output: &OutputArgs,
    stop: impl Future<Output = std::io::Result<()>>,
) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let mut save = match output.save.as_deref() {
        Some(path) => Some(
            Save::<PcapFileWriter>::create(path, capture.datalink(), save_options)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => None,
    };

    let summary = runtime.block_on(pump(&mut capture, save.as_mut(), output, stop))?;
    let stats = capture.stats().ok();
    capture.close();
    summarize_events(&mut capture);

    if let Some(save) = save.as_mut() {
        save.finish().context("failed to finish saved capture")?;
    }
    if !output.quiet {
        eprintln!(
            "OK: {} packets, {} capture errors",
            summary.packets, summary.errors
        );
        if let (Some(path), Some(save)) = (output.save.as_deref(), save.as_ref()) {
            eprintln!(
                "OK: {} packets saved -> {}",
                save.packets_written(),
                path.display()
            );
        }
        if let Some(stats) = stats {
            eprintln!(
                "stats: {} received, {} dropped, {} dropped by interface",
                stats.received, stats.dropped, stats.if_dropped
            );
        }
    }
    Ok(())
}

async fn pump<R: Reader>(
    capture: &mut Capture<R>,
    mut save: Option<&mut Save<PcapFileWriter>>,
    output: &OutputArgs,
    stop: impl Future<Output = std::io::Result<()>>,
) -> Result<Summary, CliError> {
    let mut summary = Summary::default();
    let linktype = capture.datalink();
    tokio::pin!(stop);
    let mut listening = true;

    while output.limit.is_none_or(|limit| summary.packets < limit) {
        // Reads only suspend before a dispatch or while backing off, so
        // dropping one for the signal loses no packet.
        let next = tokio::select! {
            view = capture.read() => view,
            result = &mut stop, if listening => match result {
                Ok(()) => {
                    info!("interrupted, finishing capture");
                    break;
                }
                Err(err) => {
                    warn!("cannot listen for Ctrl-C: {err}");
                    listening = false;
                    continue;
                }
            },
        };
        let Some(view) = next else {
            break;
        };
        summary.errors += summarize_events(capture);
        let data = capture
            .packet_data(&view)
            .context("packet view expired before use")?;

        if let Some(save) = save.as_deref_mut() {
            save.write(data, view.timestamp(), view.orig_len())
                .context("failed to save packet")?;
            summary.saved += 1;
        }

        let (decoded, decode_error) = if output.decode {
            match decode_frame(linktype, data) {
                Ok(decoded) => (Some(decoded), None),
                Err(err) => (None, Some(err.to_string())),
            }
        } else {
            (None, None)
        };
        let record = PacketRecord {
            index: summary.packets,
            timestamp: format_timestamp(view.timestamp()),
            len: data.len(),
            orig_len: view.orig_len(),
            data: output.hex.then(|| to_hex(data)),
            decoded,
            decode_error,
        };
        println!("{}", serialize_record(&record, output.pretty)?);
        summary.packets += 1;
    }
    Ok(summary)
}

/// Drain queued capture events and count the errors among them. The engine
/// already logged each one.
fn summarize_events<R: Reader>(capture: &mut Capture<R>) -> u64 {
    let mut errors = 0;
    while let Some(event) = capture.next_event() {
        if matches!(event, CaptureEvent::Error(_)) {
            errors += 1;
        }
    }
    errors
}

fn serialize_record(record: &PacketRecord<'_>, pretty: bool) -> Result<String, CliError> {
    if pretty {
        serde_json::to_string_pretty(record)
            .context("JSON serialization failed")
            .map_err(Into::into)
    } else {
        serde_json::to_string(record)
            .context("JSON serialization failed")
            .map_err(Into::into)
    }
}

fn format_timestamp(ts: Duration) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ts.as_nanos() as i128)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn ensure_distinct_output(input: &Path, save: &Path) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("failed to resolve input path: {}", input.display()))?;
    let save_abs = match save.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent),
        _ => fs::canonicalize("."),
    }
    .with_context(|| format!("failed to resolve output path: {}", save.display()))?;
    let Some(name) = save.file_name() else {
        return Err(CliError::new(
            format!("invalid save path: {}", save.display()),
            Some("pass a file path such as out.pcap".to_string()),
        ));
    };
    if save_abs.join(name) == input_abs {
        return Err(CliError::new(
            format!("save path must differ from input: {}", save.display()),
            Some("choose a different output path".to_string()),
        ));
    }
    Ok(())
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("use a .pcap or .pcapng file".to_string()),
        ));
    }
    let ext = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !matches!(ext.as_str(), "pcap" | "pcapng" | "cap") {
        return Err(CliError::new(
            format!("unsupported input format '{}'", input.display()),
            Some("expected a .pcap, .pcapng or .cap file".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    let mut matches = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    match matches.len() {
        0 => Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        )),
        1 => Ok(matches.remove(0)),
        n => {
            let listed = matches
                .iter()
                .take(3)
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let more = if n > 3 { ", ..." } else { "" };
            Err(CliError::new(
                format!("multiple files match pattern '{pattern}' ({n} matches); matches: {listed}{more}"),
                Some("pass a single capture file, or run once per file".to_string()),
            ))
        }
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
