//! Common data types shared across components
//!
//! This module defines the captured trace as delivered by the Link
//! Analyser: one [`TraceEvent`] per character-time sample, each carrying a
//! simultaneously sampled [`ReceiverEvent`] for receiver A and receiver B.

use serde::{Deserialize, Serialize};

pub mod cli;
pub mod error;
pub mod state;
pub mod timestamp;

pub use error::{PipelineError, PipelineResult};
pub use state::AcquisitionState;
pub use timestamp::{relative_seconds, to_absolute, Timestamp};

/// One of the two receivers monitored by the Link Analyser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Receiver {
    A,
    B,
}

impl Receiver {
    /// Both receivers, in output order
    pub const ALL: [Receiver; 2] = [Receiver::A, Receiver::B];

    /// Hexdump direction marker (`I` for A, `O` for B)
    pub fn direction(&self) -> char {
        match self {
            Receiver::A => 'I',
            Receiver::B => 'O',
        }
    }
}

impl std::fmt::Display for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Receiver::A => write!(f, "A"),
            Receiver::B => write!(f, "B"),
        }
    }
}

impl std::str::FromStr for Receiver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" | "0" => Ok(Receiver::A),
            "B" | "b" | "1" => Ok(Receiver::B),
            other => Err(format!("invalid receiver '{}', expected A or B", other)),
        }
    }
}

/// Character class of a recorded event
///
/// Raw codes follow the device's traffic-type numbering. Codes the
/// firmware may add later are kept as [`EventKind::Unknown`] so the
/// remaining trace can still be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Header,
    Data,
    Eop,
    Eep,
    DataSeqError,
    EopSeqError,
    EepSeqError,
    Timecode,
    TimecodeSeqError,
    Fct,
    Escape,
    Null,
    /// Link Analyser Mk1 only
    ParityError,
    EscapeEscapeError,
    EscapeEopError,
    EscapeEepError,
    GotBit,
    NoCharacter,
    DisconnectError,
    Unknown(u8),
}

impl EventKind {
    /// Decode a raw traffic-type code
    pub fn from_raw(code: u8) -> Self {
        use EventKind::*;
        match code {
            0 => Header,
            1 => Data,
            2 => Eop,
            3 => Eep,
            4 => DataSeqError,
            5 => EopSeqError,
            6 => EepSeqError,
            7 => Timecode,
            8 => TimecodeSeqError,
            9 => Fct,
            10 => Escape,
            11 => Null,
            12 => ParityError,
            13 => EscapeEscapeError,
            14 => EscapeEopError,
            15 => EscapeEepError,
            16 => GotBit,
            17 => NoCharacter,
            18 => DisconnectError,
            other => Unknown(other),
        }
    }

    /// Raw traffic-type code
    pub fn to_raw(&self) -> u8 {
        use EventKind::*;
        match self {
            Header => 0,
            Data => 1,
            Eop => 2,
            Eep => 3,
            DataSeqError => 4,
            EopSeqError => 5,
            EepSeqError => 6,
            Timecode => 7,
            TimecodeSeqError => 8,
            Fct => 9,
            Escape => 10,
            Null => 11,
            ParityError => 12,
            EscapeEscapeError => 13,
            EscapeEopError => 14,
            EscapeEepError => 15,
            GotBit => 16,
            NoCharacter => 17,
            DisconnectError => 18,
            Unknown(code) => *code,
        }
    }

    /// Human readable name used by the event capture log
    pub fn name(&self) -> &'static str {
        use EventKind::*;
        match self {
            Header => "Header",
            Data => "Data",
            Eop => "EOP",
            Eep => "EEP",
            DataSeqError => "Data seq error",
            EopSeqError => "EOP seq error",
            EepSeqError => "EEP seq error",
            Timecode => "Time-code",
            TimecodeSeqError => "Time-code seq error",
            Fct => "FCT",
            Escape => "Escape",
            Null => "Null",
            ParityError => "Parity Error",
            EscapeEscapeError => "Escape-escape error",
            EscapeEopError => "Escape-EOP error",
            EscapeEepError => "Escape-EEP error",
            GotBit => "Got Bit",
            NoCharacter => "No character",
            DisconnectError => "Disconnect error",
            Unknown(_) => "ERROR:Unknown",
        }
    }

    /// Header, Data, EOP or EEP (an N-Char on the link)
    pub fn is_nchar(&self) -> bool {
        matches!(self, Self::Header | Self::Data | Self::Eop | Self::Eep)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-event error flags (Mk3 error bit field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorFlags {
    pub parity: bool,
    pub rx_credit: bool,
    pub tx_credit: bool,
}

impl ErrorFlags {
    pub const PARITY_BIT: u8 = 0x01;
    pub const RX_CREDIT_BIT: u8 = 0x02;
    pub const TX_CREDIT_BIT: u8 = 0x04;

    /// Decode the Mk3 error bit field
    pub fn from_bits(bits: u8) -> Self {
        Self {
            parity: bits & Self::PARITY_BIT != 0,
            rx_credit: bits & Self::RX_CREDIT_BIT != 0,
            tx_credit: bits & Self::TX_CREDIT_BIT != 0,
        }
    }

    /// Most significant error, as printed in the event capture log
    pub fn describe(&self) -> &'static str {
        if self.parity {
            "Parity"
        } else if self.rx_credit {
            "Rx Credit"
        } else if self.tx_credit {
            "Tx Credit"
        } else {
            "None"
        }
    }
}

/// Event seen by one receiver in one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverEvent {
    pub kind: EventKind,
    /// Meaningful only for Header, Data and Timecode
    pub data: u8,
    pub errors: ErrorFlags,
}

impl ReceiverEvent {
    pub fn new(kind: EventKind, data: u8) -> Self {
        Self {
            kind,
            data,
            errors: ErrorFlags::default(),
        }
    }

    /// Sample slot where this receiver saw nothing
    pub fn idle() -> Self {
        Self::new(EventKind::NoCharacter, 0)
    }

    pub fn header(data: u8) -> Self {
        Self::new(EventKind::Header, data)
    }

    pub fn data(data: u8) -> Self {
        Self::new(EventKind::Data, data)
    }

    pub fn eop() -> Self {
        Self::new(EventKind::Eop, 0)
    }

    pub fn eep() -> Self {
        Self::new(EventKind::Eep, 0)
    }

    pub fn timecode(value: u8) -> Self {
        Self::new(EventKind::Timecode, value)
    }

    pub fn with_errors(mut self, errors: ErrorFlags) -> Self {
        self.errors = errors;
        self
    }
}

/// One captured sample: both receivers at one sample index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Sample number relative to the trigger sample (negative before it)
    pub sample_index: i64,
    pub link_a: ReceiverEvent,
    pub link_b: ReceiverEvent,
}

impl TraceEvent {
    pub fn new(sample_index: i64, link_a: ReceiverEvent, link_b: ReceiverEvent) -> Self {
        Self {
            sample_index,
            link_a,
            link_b,
        }
    }

    /// Event for the given receiver
    pub fn on(&self, receiver: Receiver) -> &ReceiverEvent {
        match receiver {
            Receiver::A => &self.link_a,
            Receiver::B => &self.link_b,
        }
    }
}

/// Complete trace retrieved after one acquisition run
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedTrace {
    pub events: Vec<TraceEvent>,
    /// Character capture clock period in seconds
    pub clock_period_s: f64,
    /// Host wall-clock instant at which the trigger was detected
    pub trigger_time: Timestamp,
}

impl CapturedTrace {
    pub fn new(events: Vec<TraceEvent>, clock_period_s: f64, trigger_time: Timestamp) -> Self {
        Self {
            events,
            clock_period_s,
            trigger_time,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Check that sample indices strictly increase
    pub fn is_monotonic(&self) -> bool {
        self.events
            .windows(2)
            .all(|pair| pair[0].sample_index < pair[1].sample_index)
    }

    /// Offset of the given sample from the trigger, in seconds
    pub fn relative_seconds(&self, sample_index: i64) -> f64 {
        relative_seconds(sample_index, self.clock_period_s)
    }

    /// Absolute timestamp of the given sample
    pub fn timestamp_of(&self, sample_index: i64) -> Timestamp {
        to_absolute(sample_index, self.clock_period_s, self.trigger_time)
    }
}
