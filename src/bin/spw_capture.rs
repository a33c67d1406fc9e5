//! spw_capture binary - records SpaceWire traffic with a Link Analyser
//!
//! Usage:
//!   cargo run --bin spw_capture -- EMU-0001 2.5                # hexdump, 2.5 s after trigger
//!   cargo run --bin spw_capture -- -v -p 100 EMU-0001 1        # event log, 100 ms pre-trigger
//!   cargo run --bin spw_capture -- -f capture.toml -a          # settings from file, archive packets
//!
//! The hexdump or event log is written to stdout; diagnostics go to stderr.

use std::io::{self, BufWriter, Write};

use chrono::Local;
use clap::Parser;
use spw_capture::archiver::{Publisher, ZmqPublisher};
use spw_capture::common::cli::CaptureArgs;
use spw_capture::config::Config;
use spw_capture::data_source_emulator::EmulatedLinkAnalyser;
use spw_capture::pipeline::run_capture;
use spw_capture::reader::find_device;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        error!(error = %e, "Capture failed");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // Initialize tracing (logging) on stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("spw_capture=info".parse()?))
        .with_writer(io::stderr)
        .init();

    let args = CaptureArgs::parse();

    let config_path = &args.common.config_file;
    let mut config = if std::path::Path::new(config_path).exists() {
        info!(config_file = %config_path, "Loaded configuration");
        Config::load(config_path)?
    } else {
        Config::default()
    };
    args.apply_to(&mut config)?;

    let devices = vec![EmulatedLinkAnalyser::new(config.emulator.clone())];
    let device = find_device(devices, &config.device.serial_number)?;

    let mut publisher = match &config.archive {
        Some(archive) => Some(ZmqPublisher::bind(&archive.endpoint)?),
        None => None,
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let report = run_capture(
        &config,
        device,
        &mut out,
        Local,
        publisher.as_mut().map(|p| p as &mut dyn Publisher),
    )?;
    out.flush()?;

    info!(
        events = report.events,
        records = report.records,
        published = report.archive.map(|a| a.published).unwrap_or(0),
        "Capture finished"
    );
    Ok(())
}
