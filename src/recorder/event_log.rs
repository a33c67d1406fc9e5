//! Verbose per-event capture log
//!
//! One row per in-window trace sample showing both receivers side by side.
//! Rows are produced from the reassembler's pass-through view, so the log
//! and the packet decode come from the same scan of the trace.

use std::io::{self, Write};

use crate::common::ReceiverEvent;
use crate::reader::decoder::WindowedEvent;

/// Column header of the capture log
pub const EVENT_LOG_HEADER: &str = "Index   Time            Event A Type        Event A Data    Error        Event B Type        Event B Data    Error";

/// Writes the event capture log
///
/// Write errors inside the observer callback are held until [`finish`].
///
/// [`finish`]: EventLogWriter::finish
pub struct EventLogWriter<W: Write> {
    out: W,
    rows: usize,
    error: Option<io::Error>,
}

impl<W: Write> EventLogWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            rows: 0,
            error: None,
        }
    }

    pub fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", EVENT_LOG_HEADER)
    }

    pub fn write_event(&mut self, event: &WindowedEvent<'_>) -> io::Result<()> {
        let a = &event.event.link_a;
        let b = &event.event.link_b;
        writeln!(
            self.out,
            "{:<8}{:010.4}ms    {}{}",
            event.position,
            event.relative_ms,
            Column(a, true),
            Column(b, false)
        )?;
        self.rows += 1;
        Ok(())
    }

    /// Observer entry point; stops writing after the first error
    pub fn observe(&mut self, event: &WindowedEvent<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_event(event) {
            self.error = Some(e);
        }
    }

    /// Flush and report the number of rows, or the first write error
    pub fn finish(mut self) -> io::Result<usize> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.rows)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One receiver's columns; `pad_error` pads the error field to its width
struct Column<'a>(&'a ReceiverEvent, bool);

impl std::fmt::Display for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Column(event, pad_error) = self;
        write!(f, "{:<20}{:02X}              ", event.kind.name(), event.data)?;
        if *pad_error {
            write!(f, "{:<13}", event.errors.describe())
        } else {
            write!(f, "{}", event.errors.describe())
        }
    }
}
