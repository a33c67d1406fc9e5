//! Packet hexdump output
//!
//! ```text
//!
//! I 2022-04-27T12:30:15.000005
//! 000000 01 02 03 04 05 06 07 08
//! 000008 09 0A
//!
//! O 2022-04-27T12:30:15.000107
//! 000000 3F
//! ```
//!
//! Each packet starts a new block; the byte offset restarts at zero.
//! Time-codes are printed as a one-byte block. Packets still open at the
//! end of the trace come last, without the blank separator line, each
//! followed by `### Incomplete packet ###`. The dump ends with a blank line.

use chrono::{Local, TimeZone};
use std::fmt::Display;
use std::io::{self, Write};

use crate::reader::decoder::{DecodedItem, DecodedTrace, ReconstructedPacket, StandaloneToken};

/// Bytes per hexdump line
pub const BYTES_PER_LINE: usize = 8;

/// Marker line written after a packet that was still open at end of trace
pub const INCOMPLETE_MARKER: &str = "### Incomplete packet ###";

/// Counts of records written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HexdumpStats {
    pub packets: usize,
    pub incomplete: usize,
    pub timecodes: usize,
}

/// Writes reconstructed packets and time-codes as a hexdump
pub struct HexdumpWriter<W: Write, Tz: TimeZone = Local> {
    out: W,
    tz: Tz,
    stats: HexdumpStats,
}

impl<W: Write, Tz: TimeZone> HexdumpWriter<W, Tz>
where
    Tz::Offset: Display,
{
    pub fn with_timezone(out: W, tz: Tz) -> Self {
        Self {
            out,
            tz,
            stats: HexdumpStats::default(),
        }
    }

    pub fn stats(&self) -> HexdumpStats {
        self.stats
    }

    /// Terminated packets open with a blank line; a packet still open at the
    /// end of the trace does not and is followed by [`INCOMPLETE_MARKER`].
    pub fn write_packet(&mut self, packet: &ReconstructedPacket) -> io::Result<()> {
        if packet.is_terminated() {
            writeln!(self.out)?;
        }
        write!(
            self.out,
            "{} {}\n",
            packet.receiver.direction(),
            packet.start_timestamp.format_in(&self.tz)
        )?;
        for (line, chunk) in packet.bytes.chunks(BYTES_PER_LINE).enumerate() {
            write!(self.out, "{:06X}", line * BYTES_PER_LINE)?;
            for byte in chunk {
                write!(self.out, " {:02X}", byte)?;
            }
            writeln!(self.out)?;
        }

        if packet.is_terminated() {
            self.stats.packets += 1;
        } else {
            writeln!(self.out, "{}", INCOMPLETE_MARKER)?;
            self.stats.incomplete += 1;
        }
        Ok(())
    }

    pub fn write_token(&mut self, token: &StandaloneToken) -> io::Result<()> {
        write!(
            self.out,
            "\n{} {}\n{:06X} {:02X}\n",
            token.receiver.direction(),
            token.timestamp.format_in(&self.tz),
            0,
            token.value
        )?;
        self.stats.timecodes += 1;
        Ok(())
    }

    pub fn write_item(&mut self, item: &DecodedItem) -> io::Result<()> {
        match item {
            DecodedItem::Packet(p) => self.write_packet(p),
            DecodedItem::Token(t) => self.write_token(t),
        }
    }

    /// Write both receivers' records in emission order, then a closing blank line
    pub fn write_trace(&mut self, decoded: &DecodedTrace) -> io::Result<HexdumpStats> {
        for item in decoded.merged() {
            self.write_item(item)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(self.stats)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{EventKind, Receiver, Timestamp};
    use crate::reader::decoder::Terminator;
    use chrono::Utc;

    fn packet(receiver: Receiver, bytes: Vec<u8>, terminator: Terminator) -> ReconstructedPacket {
        ReconstructedPacket {
            receiver,
            start_timestamp: Timestamp::new(1_651_062_615, 5_000),
            start_index: 0,
            end_index: (terminator != Terminator::Incomplete).then_some(bytes.len() as i64),
            bytes,
            terminator,
        }
    }

    fn render(f: impl FnOnce(&mut HexdumpWriter<Vec<u8>, Utc>) -> io::Result<()>) -> String {
        let mut writer = HexdumpWriter::with_timezone(Vec::new(), Utc);
        f(&mut writer).unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_packet_lines() {
        let text = render(|w| w.write_packet(&packet(Receiver::A, (1..=10).collect(), Terminator::Eop)));
        assert_eq!(
            text,
            "\nI 2022-04-27T12:30:15.000005\n000000 01 02 03 04 05 06 07 08\n000008 09 0A\n"
        );
    }

    #[test]
    fn test_offset_restarts_per_packet() {
        let text = render(|w| {
            w.write_packet(&packet(Receiver::B, vec![0xAA; 9], Terminator::Eep))?;
            w.write_packet(&packet(Receiver::B, vec![0xBB], Terminator::Eop))
        });
        let offsets: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with('0'))
            .map(|l| &l[..6])
            .collect();
        assert_eq!(offsets, vec!["000000", "000008", "000000"]);
        assert!(text.contains("\nO 2022-04-27T12:30:15.000005\n"));
    }

    #[test]
    fn test_incomplete_marker() {
        let mut writer = HexdumpWriter::with_timezone(Vec::new(), Utc);
        writer
            .write_packet(&packet(Receiver::A, vec![0x05, 0x06], Terminator::Incomplete))
            .unwrap();
        assert_eq!(writer.stats().incomplete, 1);
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "I 2022-04-27T12:30:15.000005\n000000 05 06\n### Incomplete packet ###\n"
        );
    }

    #[test]
    fn test_timecode_block() {
        let token = StandaloneToken {
            receiver: Receiver::B,
            kind: EventKind::Timecode,
            value: 0x3F,
            timestamp: Timestamp::new(0, 999_999_999),
            sample_index: 0,
        };
        let text = render(|w| w.write_token(&token));
        assert_eq!(text, "\nO 1970-01-01T00:00:00.999999\n000000 3F\n");
    }

    #[test]
    fn test_write_trace_stats() {
        let decoded = DecodedTrace {
            a: vec![DecodedItem::Packet(packet(Receiver::A, vec![1, 2], Terminator::Eop))],
            b: vec![DecodedItem::Packet(packet(Receiver::B, vec![3], Terminator::Incomplete))],
        };
        let mut writer = HexdumpWriter::with_timezone(Vec::new(), Utc);
        let stats = writer.write_trace(&decoded).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "\nI 2022-04-27T12:30:15.000005\n000000 01 02\n\
             O 2022-04-27T12:30:15.000005\n000000 03\n### Incomplete packet ###\n\n"
        );
        assert_eq!(
            stats,
            HexdumpStats {
                packets: 1,
                incomplete: 1,
                timecodes: 0
            }
        );
    }
}
