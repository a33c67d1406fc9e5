//! End-to-end capture run
//!
//! acquisition -> capture header -> hexdump or event log -> optional archive

use chrono::TimeZone;
use std::fmt::Display;
use std::io::Write;
use tracing::info;

use crate::archiver::{ArchiveSummary, PacketArchiver, Publisher};
use crate::common::{PipelineResult, Timestamp};
use crate::config::Config;
use crate::reader::decoder::TraceDecoder;
use crate::reader::{AcquisitionController, AcquisitionSettings, LinkAnalyser};
use crate::recorder::{write_capture, CaptureHeader};

/// What a capture run produced
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub trigger_time: Timestamp,
    /// Samples retrieved from the device
    pub events: usize,
    /// Packets and time-codes decoded across both receivers
    pub records: usize,
    pub archive: Option<ArchiveSummary>,
}

/// Run one acquisition on `device` and write its output to `out`
///
/// Packets are archived when both `publisher` and an `[archive]` section
/// are present.
pub fn run_capture<D, W, Tz>(
    config: &Config,
    device: D,
    out: &mut W,
    tz: Tz,
    publisher: Option<&mut dyn Publisher>,
) -> PipelineResult<CaptureReport>
where
    D: LinkAnalyser,
    W: Write,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let device_info = device.info()?;
    info!(
        name = %device_info.name,
        serial = %device_info.serial_number,
        firmware = %device_info.firmware_version,
        "Using Link Analyser"
    );

    let mut controller = AcquisitionController::new(device, AcquisitionSettings::from_config(config));
    let trace = controller.run()?;

    let header = CaptureHeader::new(config, device_info, trace.trigger_time);
    let decoder = TraceDecoder::new(config.capture.window());
    let decoded = write_capture(out, tz.clone(), &header, config.capture.output, &decoder, &trace)?;

    let archive = match (publisher, &config.archive) {
        (Some(publisher), Some(archive_config)) => {
            let mut archiver = PacketArchiver::with_timezone(publisher, archive_config.clone(), tz);
            Some(archiver.archive(&decoded)?)
        }
        _ => None,
    };

    Ok(CaptureReport {
        trigger_time: trace.trigger_time,
        events: trace.len(),
        records: decoded.len(),
        archive,
    })
}
