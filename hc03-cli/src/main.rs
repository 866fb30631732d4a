use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hc03_lib::decode::{GlucoseByteOrder, OxygenFormat, PressureFormat};
use hc03_lib::frame::{encode_request, encode_response, split_frame};
use hc03_lib::{Command, Event, OfflineTransport, SensorKind, Session, SessionConfig, SessionInput};

/// Offline tooling for the HC03 health monitor protocol.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional path to a file to write logs to, in addition to stderr.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed captured notification buffers through a session and print events as JSON lines.
    Replay {
        /// Capture file: one hex buffer per line, `#` starts a comment.
        file: PathBuf,
        /// Detection to arm before replaying (ECG, OX, BP, BG, BATTERY, BT). Repeatable.
        #[arg(short, long = "arm")]
        arm: Vec<SensorKind>,
        /// Arm every detection.
        #[arg(long, conflicts_with = "arm")]
        arm_all: bool,
        /// Session configuration (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, value_enum)]
        oxygen: Option<OxygenArg>,
        #[arg(long, value_enum)]
        pressure: Option<PressureArg>,
        #[arg(long, value_enum)]
        glucose_order: Option<ByteOrderArg>,
        /// Print pipeline counters to stderr when done.
        #[arg(long)]
        stats: bool,
    },
    /// Encode a frame, optionally cut into a head and tail fragment.
    Encode {
        /// Sensor type byte (e.g. 0x8F) or detection token (e.g. BATTERY).
        #[arg(short = 't', long = "type", value_parser = parse_type_code)]
        sensor_type: u8,
        /// Frame content as hex.
        content: String,
        /// Content bytes to keep in the head fragment.
        #[arg(short, long)]
        split: Option<usize>,
        /// Use the host-request start marker instead of the device-response one.
        #[arg(long)]
        request: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OxygenArg {
    Waveform,
    Structured,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PressureArg {
    ContentTagged,
    Structured,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ByteOrderArg {
    BigEndian,
    LittleEndian,
}

fn parse_type_code(s: &str) -> Result<u8, String> {
    let s = s.trim();
    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u8::from_str_radix(hex_digits, 16).map_err(|e| format!("invalid type byte '{}': {}", s, e));
    }
    if let Ok(code) = s.parse::<u8>() {
        return Ok(code);
    }
    s.parse::<SensorKind>().map(SensorKind::type_code).map_err(|e| e.to_string())
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    // stdout carries the JSON event stream, so the console log goes to stderr.
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file, &cli.verbose)?;

    let result = match cli.command {
        Commands::Replay {
            file,
            arm,
            arm_all,
            config,
            oxygen,
            pressure,
            glucose_order,
            stats,
        } => {
            let mut session_config = match config {
                Some(path) => SessionConfig::from_json_file(&path)
                    .with_context(|| format!("Failed to load config from {:?}", path))?,
                None => SessionConfig::default(),
            };
            if let Some(oxygen) = oxygen {
                session_config.firmware.oxygen = match oxygen {
                    OxygenArg::Waveform => OxygenFormat::Waveform,
                    OxygenArg::Structured => OxygenFormat::Structured,
                };
            }
            if let Some(pressure) = pressure {
                session_config.firmware.pressure = match pressure {
                    PressureArg::ContentTagged => PressureFormat::ContentTagged,
                    PressureArg::Structured => PressureFormat::Structured,
                };
            }
            if let Some(order) = glucose_order {
                session_config.firmware.glucose_byte_order = match order {
                    ByteOrderArg::BigEndian => GlucoseByteOrder::BigEndian,
                    ByteOrderArg::LittleEndian => GlucoseByteOrder::LittleEndian,
                };
            }
            let kinds = if arm_all { SensorKind::ALL.to_vec() } else { arm };
            replay(&file, session_config, &kinds, stats).await
        }
        Commands::Encode {
            sensor_type,
            content,
            split,
            request,
        } => encode(sensor_type, &content, split, request),
    };

    if let Err(e) = result {
        error!("{:?}", e);
        process::exit(1);
    }
    Ok(())
}

/// Parses a capture file into notification buffers.
fn read_capture(path: &Path) -> Result<Vec<Bytes>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read capture {:?}", path))?;
    let mut buffers = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        let digits: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() {
            continue;
        }
        let bytes = hex::decode(&digits).with_context(|| format!("Line {}: invalid hex", index + 1))?;
        buffers.push(Bytes::from(bytes));
    }
    Ok(buffers)
}

async fn replay(path: &Path, config: SessionConfig, kinds: &[SensorKind], print_stats: bool) -> Result<()> {
    let buffers = read_capture(path)?;
    if buffers.is_empty() {
        warn!("No buffers in {:?}", path);
    }
    info!(buffers = buffers.len(), armed = ?kinds, "Replaying capture");

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel::<SessionInput>();
    let session = Session::new(config, OfflineTransport::new(), events_tx);
    let runner = tokio::spawn(session.run(inbox_rx));

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            println!("{}", serde_json::to_string(&event)?);
        }
        Ok::<(), serde_json::Error>(())
    });

    inbox_tx.send(Command::Initialize.into())?;
    for kind in kinds {
        inbox_tx.send(Command::Arm(*kind).into())?;
    }
    for buffer in buffers {
        inbox_tx.send(Command::SubmitBytes(buffer).into())?;
    }
    drop(inbox_tx);

    let session = runner.await.context("Session task failed")?;
    let stats = session.stats();
    drop(session);
    printer.await.context("Printer task failed")??;

    if print_stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

fn encode(sensor_type: u8, content_hex: &str, split: Option<usize>, request: bool) -> Result<()> {
    let digits: String = content_hex.chars().filter(|c| !c.is_whitespace()).collect();
    let content = hex::decode(&digits).context("Content is not valid hex")?;
    if content.len() > u16::MAX as usize {
        bail!("Content of {} bytes does not fit the length field", content.len());
    }

    let frame = if request {
        encode_request(sensor_type, &content)
    } else {
        encode_response(sensor_type, &content)
    };

    match split {
        None => println!("{}", hex::encode(&frame)),
        Some(n) if n >= content.len() => bail!("Split point {} leaves an empty tail", n),
        Some(n) => {
            let (head, tail) = split_frame(&frame, n);
            println!("{}", hex::encode(&head));
            println!("{}", hex::encode(&tail));
        }
    }
    Ok(())
}
