//! Configuration module for spw-capture
//!
//! Configuration is loaded from a TOML file and can be overridden from the
//! command line. The resolved [`Config`] is immutable and passed by
//! reference into the acquisition controller, the reassembler and the
//! output sinks.
//!
//! # Example
//! ```ignore
//! let config = Config::load("config.toml")?;
//! let window = config.capture.window();
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::common::{EventKind, Receiver};
use crate::data_source_emulator::EmulatorConfig;
use crate::reader::decoder::PreTriggerWindow;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Archive producer settings; absent disables archiving
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,
    /// Emulated Link Analyser settings
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that TOML typing cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.capture.duration_s.is_finite() || self.capture.duration_s < 0.0 {
            return Err(ConfigError::invalid(
                "capture.duration_s",
                format!("{} is not a non-negative number of seconds", self.capture.duration_s),
            ));
        }
        if self.device.serial_number.trim().is_empty() {
            return Err(ConfigError::invalid("device.serial_number", "must not be empty"));
        }
        if let Some(archive) = &self.archive {
            if archive.topic.is_empty() {
                return Err(ConfigError::invalid("archive.topic", "must not be empty"));
            }
            if archive.max_message_bytes == 0 {
                return Err(ConfigError::invalid("archive.max_message_bytes", "must be > 0"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Device
// =============================================================================

/// Link Analyser selection
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Serial number of the Link Analyser to record with
    #[serde(default = "default_serial_number")]
    pub serial_number: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial_number: default_serial_number(),
        }
    }
}

fn default_serial_number() -> String {
    "EMU-0001".to_string()
}

// =============================================================================
// Capture
// =============================================================================

/// What the capture run writes to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Packet-based hexdump
    #[default]
    Hexdump,
    /// Verbose per-event capture log
    EventLog,
}

/// Acquisition timing and output settings
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Time to keep recording after the trigger, in seconds
    #[serde(default = "default_duration_s")]
    pub duration_s: f64,

    /// How far before the trigger events are still decoded, in milliseconds
    /// (absent = the whole pre-trigger memory)
    #[serde(default)]
    pub pre_trigger_ms: Option<u32>,

    #[serde(default)]
    pub output: OutputMode,

    /// Sleep between trigger-state polls
    #[serde(default = "default_trigger_poll_interval_ms")]
    pub trigger_poll_interval_ms: u64,

    /// Device memory kept after the trigger (in events)
    #[serde(default)]
    pub post_trigger_depth: u32,

    #[serde(default)]
    pub characters: CharacterClasses,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_s: default_duration_s(),
            pre_trigger_ms: None,
            output: OutputMode::default(),
            trigger_poll_interval_ms: default_trigger_poll_interval_ms(),
            post_trigger_depth: 0,
            characters: CharacterClasses::default(),
        }
    }
}

impl CaptureConfig {
    /// Windowing filter for the configured pre-trigger horizon
    pub fn window(&self) -> PreTriggerWindow {
        match self.pre_trigger_ms {
            Some(ms) => PreTriggerWindow::new(ms),
            None => PreTriggerWindow::unbounded(),
        }
    }
}

fn default_duration_s() -> f64 {
    1.0
}

fn default_trigger_poll_interval_ms() -> u64 {
    1
}

/// Character classes the device records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CharacterClasses {
    pub nulls: bool,
    pub fcts: bool,
    pub timecodes: bool,
    /// Header, data, EOP and EEP characters
    pub nchars: bool,
}

impl Default for CharacterClasses {
    fn default() -> Self {
        Self {
            nulls: false,
            fcts: true,
            timecodes: true,
            nchars: true,
        }
    }
}

impl CharacterClasses {
    /// Parse the 4-bit command-line mask (bit3 NULL, bit2 FCT, bit1
    /// time-code, bit0 N-Char)
    pub fn from_mask(mask: u8) -> Result<Self, ConfigError> {
        if mask > 0x0F {
            return Err(ConfigError::invalid("chars", format!("{} is not in 0-15", mask)));
        }
        Ok(Self {
            nulls: (mask >> 3) & 1 == 1,
            fcts: (mask >> 2) & 1 == 1,
            timecodes: (mask >> 1) & 1 == 1,
            nchars: mask & 1 == 1,
        })
    }

    pub fn to_mask(&self) -> u8 {
        (self.nulls as u8) << 3 | (self.fcts as u8) << 2 | (self.timecodes as u8) << 1 | self.nchars as u8
    }

    /// Whether an event of this kind survives the recording filter
    pub fn records(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Null => self.nulls,
            EventKind::Fct => self.fcts,
            EventKind::Timecode => self.timecodes,
            k if k.is_nchar() => self.nchars,
            _ => true,
        }
    }
}

// =============================================================================
// Trigger
// =============================================================================

/// Event kinds the first trigger stage can fire on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerEvent {
    #[default]
    Timecode,
    Fct,
    Header,
    Eop,
    Eep,
}

impl TriggerEvent {
    /// Whether a recorded event satisfies this trigger condition
    pub fn matches(&self, kind: EventKind) -> bool {
        matches!(
            (self, kind),
            (TriggerEvent::Timecode, EventKind::Timecode)
                | (TriggerEvent::Fct, EventKind::Fct)
                | (TriggerEvent::Header, EventKind::Header)
                | (TriggerEvent::Eop, EventKind::Eop)
                | (TriggerEvent::Eep, EventKind::Eep)
        )
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEvent::Timecode => write!(f, "Timecode"),
            TriggerEvent::Fct => write!(f, "FCT"),
            TriggerEvent::Header => write!(f, "Header"),
            TriggerEvent::Eop => write!(f, "EOP"),
            TriggerEvent::Eep => write!(f, "EEP"),
        }
    }
}

/// First stage of the device trigger sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_trigger_receiver")]
    pub receiver: Receiver,
    #[serde(default)]
    pub event: TriggerEvent,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            receiver: default_trigger_receiver(),
            event: TriggerEvent::default(),
        }
    }
}

fn default_trigger_receiver() -> Receiver {
    Receiver::B
}

// =============================================================================
// Archive
// =============================================================================

/// Archive producer settings
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// ZMQ PUB bind address (e.g., "tcp://*:5600")
    #[serde(default = "default_archive_endpoint")]
    pub endpoint: String,
    pub topic: String,
    #[serde(default)]
    pub test_id: String,
    #[serde(default)]
    pub test_version: String,
    /// Interface name reported for receiver A
    #[serde(default = "default_interface_id_in")]
    pub interface_id_in: String,
    /// Interface name reported for receiver B
    #[serde(default = "default_interface_id_out")]
    pub interface_id_out: String,
    #[serde(default)]
    pub db_version: String,
    #[serde(default)]
    pub asw_version: String,
    /// Fixed transport buffer size; larger messages are dropped
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl ArchiveConfig {
    /// Interface id reported for packets of the given receiver
    pub fn interface_id(&self, receiver: Receiver) -> &str {
        match receiver {
            Receiver::A => &self.interface_id_in,
            Receiver::B => &self.interface_id_out,
        }
    }
}

fn default_archive_endpoint() -> String {
    "tcp://*:5600".to_string()
}

fn default_interface_id_in() -> String {
    "Receiver A".to_string()
}

fn default_interface_id_out() -> String {
    "Receiver B".to_string()
}

pub fn default_max_message_bytes() -> usize {
    1_000_050
}
