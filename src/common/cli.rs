//! CLI argument parsing for spw_capture
//!
//! # Design Principles (KISS)
//! - Use clap's derive macro for declarative argument definition
//! - The TOML file supplies defaults; anything given here overrides it

use clap::Parser;

use crate::common::Receiver;
use crate::config::{CharacterClasses, Config, ConfigError, OutputMode, TriggerEvent};

/// Common arguments shared by every binary
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(short = 'f', long = "config", default_value = "config.toml")]
    pub config_file: String,
}

/// Arguments for the capture binary
#[derive(Parser, Debug, Clone)]
#[command(name = "spw_capture", about = "Record SpaceWire traffic with a Link Analyser")]
pub struct CaptureArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Serial number of the Link Analyser
    #[arg(value_name = "SERIAL_NO")]
    pub serial: Option<String>,

    /// Seconds to keep recording after the trigger
    #[arg(value_name = "SECONDS")]
    pub seconds: Option<f64>,

    /// Recorded character classes as a 4-bit mask
    /// (bit3 NULL, bit2 FCT, bit1 time-code, bit0 N-Char)
    #[arg(short = 'c', long = "chars", value_parser = clap::value_parser!(u8).range(0..=15))]
    pub chars: Option<u8>,

    /// Trigger on FCT instead of time-code
    #[arg(short = 't', long = "trig-fct")]
    pub trig_fct: bool,

    /// Receiver the trigger watches (A or B)
    #[arg(short = 'r', long = "receiver")]
    pub receiver: Option<Receiver>,

    /// Pre-trigger window in milliseconds
    #[arg(short = 'p', long = "pretrigger", value_name = "MILLIS")]
    pub pretrigger: Option<u32>,

    /// Write the per-event capture log instead of the hexdump
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Also publish completed packets to the archive
    #[arg(short = 'a', long = "archive")]
    pub archive: bool,
}

impl CaptureArgs {
    /// Overlay command-line values on a loaded configuration
    pub fn apply_to(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(serial) = &self.serial {
            config.device.serial_number = serial.clone();
        }
        if let Some(seconds) = self.seconds {
            config.capture.duration_s = seconds;
        }
        if let Some(mask) = self.chars {
            config.capture.characters = CharacterClasses::from_mask(mask)?;
        }
        if self.trig_fct {
            config.trigger.event = TriggerEvent::Fct;
        }
        if let Some(receiver) = self.receiver {
            config.trigger.receiver = receiver;
        }
        if let Some(ms) = self.pretrigger {
            config.capture.pre_trigger_ms = Some(ms);
        }
        if self.verbose {
            config.capture.output = OutputMode::EventLog;
        }
        if self.archive && config.archive.is_none() {
            return Err(ConfigError::Invalid {
                field: "archive",
                reason: "--archive given but the config file has no [archive] section".to_string(),
            });
        }
        if !self.archive {
            config.archive = None;
        }
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_args_default() {
        let args = CommonArgs::try_parse_from(["test"]).unwrap();
        assert_eq!(args.config_file, "config.toml");
    }

    #[test]
    fn test_common_args_long_config() {
        let args = CommonArgs::try_parse_from(["test", "--config", "my_config.toml"]).unwrap();
        assert_eq!(args.config_file, "my_config.toml");
    }

    #[test]
    fn test_capture_args_positional() {
        let args = CaptureArgs::try_parse_from(["test", "LA3-00042", "2.5"]).unwrap();
        assert_eq!(args.serial.as_deref(), Some("LA3-00042"));
        assert_eq!(args.seconds, Some(2.5));
        assert!(!args.verbose);
        assert!(!args.archive);
    }

    #[test]
    fn test_capture_args_full() {
        let args = CaptureArgs::try_parse_from([
            "test", "-f", "spw.toml", "-c", "15", "-t", "-r", "A", "-p", "250", "-v", "123", "1",
        ])
        .unwrap();
        assert_eq!(args.common.config_file, "spw.toml");
        assert_eq!(args.chars, Some(15));
        assert!(args.trig_fct);
        assert_eq!(args.receiver, Some(Receiver::A));
        assert_eq!(args.pretrigger, Some(250));
        assert!(args.verbose);
        assert_eq!(args.serial.as_deref(), Some("123"));
    }

    #[test]
    fn test_chars_out_of_range() {
        assert!(CaptureArgs::try_parse_from(["test", "-c", "16"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let args = CaptureArgs::try_parse_from([
            "test", "-c", "2", "-t", "-r", "a", "-p", "0", "-v", "SN-7", "0.25",
        ])
        .unwrap();
        let mut config = Config::default();
        args.apply_to(&mut config).unwrap();

        assert_eq!(config.device.serial_number, "SN-7");
        assert_eq!(config.capture.duration_s, 0.25);
        assert!(config.capture.characters.timecodes);
        assert!(!config.capture.characters.nchars);
        assert_eq!(config.trigger.event, TriggerEvent::Fct);
        assert_eq!(config.trigger.receiver, Receiver::A);
        assert_eq!(config.capture.pre_trigger_ms, Some(0));
        assert_eq!(config.capture.output, OutputMode::EventLog);
        assert!(config.archive.is_none());
    }

    #[test]
    fn test_archive_requires_section() {
        let args = CaptureArgs::try_parse_from(["test", "-a"]).unwrap();
        let mut config = Config::default();
        assert!(args.apply_to(&mut config).is_err());
    }

    #[test]
    fn test_negative_seconds_rejected() {
        let args = CaptureArgs::try_parse_from(["test", "SN", "--", "-1"]).unwrap();
        let mut config = Config::default();
        assert!(args.apply_to(&mut config).is_err());
    }
}
