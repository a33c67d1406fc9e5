//! Capture header written at the top of both text outputs

use chrono::TimeZone;
use std::fmt::Display;
use std::io::{self, Write};

use crate::common::Timestamp;
use crate::config::{CharacterClasses, Config, TriggerConfig};
use crate::reader::device::DeviceInfo;

/// Software identification line
pub fn software_version() -> String {
    format!("spw_capture {}", env!("CARGO_PKG_VERSION"))
}

fn field<W: Write>(out: &mut W, label: &str, value: &dyn Display) -> io::Result<()> {
    writeln!(out, "# {:<21}{}", label, value)
}

/// Run description printed before the hexdump or event log
#[derive(Debug, Clone)]
pub struct CaptureHeader {
    pub trigger_time: Timestamp,
    pub duration_s: f64,
    pub pre_trigger_ms: Option<u32>,
    pub trigger: TriggerConfig,
    pub characters: CharacterClasses,
    pub device: DeviceInfo,
}

impl CaptureHeader {
    pub fn new(config: &Config, device: DeviceInfo, trigger_time: Timestamp) -> Self {
        Self {
            trigger_time,
            duration_s: config.capture.duration_s,
            pre_trigger_ms: config.capture.pre_trigger_ms,
            trigger: config.trigger,
            characters: config.capture.characters,
            device,
        }
    }

    pub fn write_to<W, Tz>(&self, out: &mut W, tz: &Tz) -> io::Result<()>
    where
        W: Write,
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let flag = |enabled: bool| if enabled { 1 } else { 0 };

        field(out, "Trigger timestamp:", &self.trigger_time.format_in(tz))?;
        field(out, "Software version:", &software_version())?;

        writeln!(out, "\n### Configuration")?;
        field(out, "Record duration:", &format!("{}s", self.duration_s))?;
        let pre_trigger = match self.pre_trigger_ms {
            Some(ms) => format!("{}ms", ms),
            None => "unlimited".to_string(),
        };
        field(out, "PreTrig duration:", &pre_trigger)?;
        field(
            out,
            "Trigger event:",
            &format!("{} on receiver {}", self.trigger.event, self.trigger.receiver),
        )?;
        field(out, "Enable NULLs:", &flag(self.characters.nulls))?;
        field(out, "Enable FCTs:", &flag(self.characters.fcts))?;
        field(out, "Enable Timecodes:", &flag(self.characters.timecodes))?;
        field(out, "Enable NChars:", &flag(self.characters.nchars))?;

        writeln!(out, "\n### Link Analyser")?;
        field(out, "API version:", &self.device.api_version)?;
        field(out, "Device name:", &self.device.name)?;
        field(out, "Serial number:", &self.device.serial_number)?;
        field(out, "Device version:", &self.device.device_version)?;
        field(out, "Firmware version:", &self.device.firmware_version)?;
        field(out, "Build date:", &self.device.build_date_string())?;
        Ok(())
    }
}
