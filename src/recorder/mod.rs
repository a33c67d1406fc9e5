//! Recorder component - writes a decoded trace as text
//!
//! Two output modes share one capture header:
//! - Hexdump: reconstructed packets and time-codes, one block per record
//! - Event log: every in-window trace sample, both receivers side by side
//!
//! The trace is decoded exactly once in either mode; the decoded packets are
//! returned so the archive producer can publish them afterwards.

mod event_log;
mod header;
mod hexdump;

pub use event_log::{EventLogWriter, EVENT_LOG_HEADER};
pub use header::{software_version, CaptureHeader};
pub use hexdump::{HexdumpStats, HexdumpWriter, BYTES_PER_LINE, INCOMPLETE_MARKER};

use chrono::TimeZone;
use std::fmt::Display;
use std::io::{self, Write};
use tracing::info;

use crate::common::CapturedTrace;
use crate::config::OutputMode;
use crate::reader::decoder::{DecodedTrace, TraceDecoder};

/// Decode `trace` and write the selected text output to `out`
pub fn write_capture<W, Tz>(
    out: &mut W,
    tz: Tz,
    header: &CaptureHeader,
    mode: OutputMode,
    decoder: &TraceDecoder,
    trace: &CapturedTrace,
) -> io::Result<DecodedTrace>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: Display,
{
    header.write_to(out, &tz)?;

    match mode {
        OutputMode::Hexdump => {
            let decoded = decoder.decode(trace);
            let mut writer = HexdumpWriter::with_timezone(&mut *out, tz);
            let stats = writer.write_trace(&decoded)?;
            info!(
                packets = stats.packets,
                incomplete = stats.incomplete,
                timecodes = stats.timecodes,
                "Hexdump written"
            );
            Ok(decoded)
        }
        OutputMode::EventLog => {
            writeln!(out)?;
            let mut writer = EventLogWriter::new(&mut *out);
            writer.write_header()?;
            let decoded = decoder.decode_with_observer(trace, |event| writer.observe(event));
            let rows = writer.finish()?;
            info!(rows, records = decoded.len(), "Event log written");
            Ok(decoded)
        }
    }
}
