// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! iqcast — SDR receiver front-end.
//!
//! Opens a tuner, band-pass filters and decimates its I/Q stream
//! inside the device callback, and forwards the result to a TCP
//! downstream. The main thread configures everything, then parks in a
//! signal wait, checking once per second that the tuner is still
//! delivering.

mod config;
mod signals;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use iqcast_backend::{Backend, Device, Receiver, TunerSettings};
use iqcast_core::filter::{self, Coefficients};
use iqcast_core::{Pipeline, Sender};

use config::Config;
use signals::SignalMask;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - SDR receiver front-end");

/// Seconds between `is_streaming` health checks.
const HEALTH_CHECK_SECS: u32 = 1;

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to a `key = value` configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

/// Initialize logging with optional level from config.
/// Falls back to INFO if level is None or invalid.
fn init_logging(log_level: Option<&str>) {
    let level = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    let mut config_warning = None;
    if let Some(path) = &cli.config {
        if let Err(e) = config.read_file(path) {
            config_warning = Some(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ));
        }
    }

    init_logging(config.get("log_level"));
    if let Some(warning) = config_warning {
        warn!("{warning}");
    } else if let Some(path) = &cli.config {
        info!("using config file {}", path.display());
    }

    let coefficients = load_coefficients(&config);

    // Block the supervisor signals before any device thread exists so
    // every later thread inherits the mask.
    let signals = SignalMask::install()?;

    let settings = TunerSettings {
        frequency: config.require_parsed("frequency")?,
        sample_rate: config.require_parsed("sample_rate")?,
        sample_type: config.require("sample_type")?.parse()?,
        serial_number: config.parsed("serial_number")?,
    };
    let count: i64 = config.require_parsed("count")?;

    let mut backend = Backend::open(config.require("device")?, &settings, count)?;

    run_device(&mut backend, &config, coefficients, &signals)
}

/// The band-pass impulse response, or pass-through when none is
/// configured or the configured file is unusable.
fn load_coefficients(config: &Config) -> Coefficients {
    let Some(path) = config.get("filter") else {
        return vec![1.0];
    };

    match filter::read_coefficients(Path::new(path)) {
        Ok(coefficients) if coefficients.is_empty() => {
            warn!("filter file {} holds no coefficients, using pass-through", path);
            vec![1.0]
        }
        Ok(coefficients) => {
            info!("loaded {} filter coefficients from {}", coefficients.len(), path);
            coefficients
        }
        Err(e) => {
            warn!("failed to read filter file {}: {}, using pass-through", path, e);
            vec![1.0]
        }
    }
}

/// Bring up the sender and pipeline, start reception, and supervise
/// until a termination signal arrives or the device goes quiet.
fn run_device(
    device: &mut Backend,
    config: &Config,
    coefficients: Coefficients,
    signals: &SignalMask,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.require("host")?;
    let port: u16 = config.require_parsed("port")?;
    let step: usize = config.require_parsed("decimation")?;

    let sender = Sender::connect(host, port, device.buffer_size())?;
    info!("forwarding filtered samples to {}:{}", host, port);

    let pipeline = Pipeline::new(
        device.buffer_size(),
        coefficients,
        step,
        device.max_value(),
        sender,
    )?;
    let pipeline = Arc::new(Mutex::new(pipeline));

    // Reception stops when the receiver guard drops, on every exit
    // path below; the pipeline outlives any in-flight callback.
    let receiver = Receiver::start(device, pipeline)?;
    info!("streaming started");

    loop {
        let signal = signals.wait_with_alarm(HEALTH_CHECK_SECS)?;
        if signal != libc::SIGALRM {
            info!("received signal {}, shutting down", signal);
            break;
        }
        if !receiver.is_streaming() {
            return Err("Device stopped streaming".into());
        }
    }

    Ok(())
}
