//! Wall-clock timestamps and the trace time base
//!
//! The Link Analyser reports each event as a sample index relative to the
//! trigger sample. Multiplying by the character capture clock period gives
//! the offset from the trigger in seconds; adding that offset to the host
//! wall-clock instant captured when the trigger was detected yields the
//! absolute time of the event.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds in one second
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Output format used by the hexdump and the archive (`capture_time`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Absolute wall-clock time as seconds + nanoseconds since the Unix epoch
///
/// `nanos` is always in `[0, 1_000_000_000)`; negative instants carry the
/// sign in `secs` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Create a timestamp, normalizing `nanos` into range
    pub fn new(secs: i64, nanos: i64) -> Self {
        let secs = secs + nanos.div_euclid(NANOS_PER_SEC);
        let nanos = nanos.rem_euclid(NANOS_PER_SEC) as u32;
        Self { secs, nanos }
    }

    /// Current host wall-clock time
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: elapsed.as_secs() as i64,
            nanos: elapsed.subsec_nanos(),
        }
    }

    /// Shift by a signed offset in seconds
    ///
    /// The floating-point offset is split once into whole seconds and an
    /// integer nanosecond remainder; the nanosecond field is then carried
    /// or borrowed by at most one second.
    pub fn offset_by_seconds(&self, delta_s: f64) -> Self {
        let whole = delta_s.trunc();
        let remainder_ns = ((delta_s - whole) * NANOS_PER_SEC as f64).round() as i64;

        let mut secs = self.secs + whole as i64;
        let mut nanos = self.nanos as i64 + remainder_ns;

        if nanos >= NANOS_PER_SEC {
            nanos -= NANOS_PER_SEC;
            secs += 1;
        } else if nanos < 0 {
            nanos += NANOS_PER_SEC;
            secs -= 1;
        }

        Self {
            secs,
            nanos: nanos as u32,
        }
    }

    /// Convert to a chrono date-time in the given time zone
    pub fn to_datetime<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        DateTime::from_timestamp(self.secs, self.nanos).map(|utc| utc.with_timezone(tz))
    }

    /// Render as `YYYY-MM-DDTHH:MM:SS.ffffff` in the given time zone
    ///
    /// Microseconds are truncated, not rounded.
    pub fn format_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        match self.to_datetime(tz) {
            Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
            None => format!("{}.{:06}", self.secs, self.nanos / 1000),
        }
    }
}

/// Offset of a sample from the trigger, in seconds
pub fn relative_seconds(sample_index: i64, clock_period_s: f64) -> f64 {
    sample_index as f64 * clock_period_s
}

/// Convert a trigger-relative sample index into an absolute timestamp
pub fn to_absolute(sample_index: i64, clock_period_s: f64, trigger: Timestamp) -> Timestamp {
    trigger.offset_by_seconds(relative_seconds(sample_index, clock_period_s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_zero_index_is_trigger() {
        let trigger = Timestamp::new(1_650_000_000, 123_456_789);
        assert_eq!(to_absolute(0, 12.5e-9, trigger), trigger);
    }

    #[test]
    fn test_carry_across_second_boundary() {
        let trigger = Timestamp::new(10, 900_000_000);
        // 2 samples * 0.1s = +0.2s
        let ts = to_absolute(2, 0.1, trigger);
        assert_eq!(ts, Timestamp::new(11, 100_000_000));
    }

    #[test]
    fn test_borrow_for_negative_index() {
        let trigger = Timestamp::new(10, 100_000_000);
        let ts = to_absolute(-3, 0.1, trigger);
        assert_eq!(ts.secs, 9);
        assert_eq!(ts.nanos, 800_000_000);
    }

    #[test]
    fn test_negative_whole_seconds() {
        let trigger = Timestamp::new(100, 0);
        let ts = trigger.offset_by_seconds(-2.5);
        assert_eq!(ts, Timestamp::new(97, 500_000_000));
    }

    #[test]
    fn test_positive_whole_seconds() {
        let trigger = Timestamp::new(100, 250_000_000);
        let ts = trigger.offset_by_seconds(3.5);
        assert_eq!(ts, Timestamp::new(104, 750_000_000));
    }

    #[test]
    fn test_long_trace_keeps_microsecond_precision() {
        // 80 MHz capture clock, ~25 s after the trigger
        let period = 12.5e-9;
        let index = 2_000_000_003i64;
        let trigger = Timestamp::new(0, 0);
        let ts = to_absolute(index, period, trigger);
        // 2_000_000_003 * 12.5ns = 25.0000000375 s
        assert_eq!(ts.secs, 25);
        assert!((ts.nanos as i64 - 38).abs() <= 1, "nanos = {}", ts.nanos);
    }

    #[test]
    fn test_new_normalizes() {
        assert_eq!(Timestamp::new(5, 1_500_000_000), Timestamp { secs: 6, nanos: 500_000_000 });
        assert_eq!(Timestamp::new(5, -1), Timestamp { secs: 4, nanos: 999_999_999 });
    }

    #[test]
    fn test_format_truncates_to_microseconds() {
        let ts = Timestamp::new(0, 123_456_789);
        assert_eq!(ts.format_in(&Utc), "1970-01-01T00:00:00.123456");
    }

    #[test]
    fn test_format_date() {
        // 2022-04-27T12:30:15Z
        let ts = Timestamp::new(1_651_062_615, 5_000);
        assert_eq!(ts.format_in(&Utc), "2022-04-27T12:30:15.000005");
    }
}
