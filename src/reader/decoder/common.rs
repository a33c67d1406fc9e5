//! Common types for decoder module

use serde::Serialize;

use crate::common::{EventKind, Receiver, Timestamp};

/// How a reconstructed packet ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Terminator {
    /// Normal end of packet
    Eop,
    /// Error end of packet
    Eep,
    /// Trace ended before a terminator was seen
    Incomplete,
}

impl Terminator {
    pub fn from_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Eop => Some(Self::Eop),
            EventKind::Eep => Some(Self::Eep),
            _ => None,
        }
    }
}

/// Packet rebuilt from one receiver's Header/Data/EOP|EEP run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructedPacket {
    pub receiver: Receiver,
    /// Absolute time of the Header event
    pub start_timestamp: Timestamp,
    pub start_index: i64,
    /// Sample index of the terminator (`None` when incomplete)
    pub end_index: Option<i64>,
    pub bytes: Vec<u8>,
    pub terminator: Terminator,
}

impl ReconstructedPacket {
    /// Packet opened by a Header event
    pub fn open(receiver: Receiver, start_index: i64, start_timestamp: Timestamp, header: u8) -> Self {
        Self {
            receiver,
            start_timestamp,
            start_index,
            end_index: None,
            bytes: vec![header],
            terminator: Terminator::Incomplete,
        }
    }

    /// True when closed by EOP or EEP
    pub fn is_terminated(&self) -> bool {
        self.terminator != Terminator::Incomplete
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Event reported on its own, outside any packet (time-codes)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandaloneToken {
    pub receiver: Receiver,
    pub kind: EventKind,
    pub value: u8,
    pub timestamp: Timestamp,
    pub sample_index: i64,
}

/// Output record of the reassembler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DecodedItem {
    Packet(ReconstructedPacket),
    Token(StandaloneToken),
}

impl DecodedItem {
    pub fn receiver(&self) -> Receiver {
        match self {
            DecodedItem::Packet(p) => p.receiver,
            DecodedItem::Token(t) => t.receiver,
        }
    }

    /// Sample index at which the record was emitted
    ///
    /// Packets are emitted at their terminator; incomplete packets after
    /// the last sample.
    pub fn emitted_at(&self) -> i64 {
        match self {
            DecodedItem::Packet(p) => p.end_index.unwrap_or(i64::MAX),
            DecodedItem::Token(t) => t.sample_index,
        }
    }

    pub fn as_packet(&self) -> Option<&ReconstructedPacket> {
        match self {
            DecodedItem::Packet(p) => Some(p),
            DecodedItem::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&StandaloneToken> {
        match self {
            DecodedItem::Token(t) => Some(t),
            DecodedItem::Packet(_) => None,
        }
    }
}

/// Result of decoding a trace: one independent record stream per receiver
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedTrace {
    pub a: Vec<DecodedItem>,
    pub b: Vec<DecodedItem>,
}

impl DecodedTrace {
    pub fn on(&self, receiver: Receiver) -> &[DecodedItem] {
        match receiver {
            Receiver::A => &self.a,
            Receiver::B => &self.b,
        }
    }

    /// Packets of one receiver in emission order
    pub fn packets(&self, receiver: Receiver) -> impl Iterator<Item = &ReconstructedPacket> {
        self.on(receiver).iter().filter_map(DecodedItem::as_packet)
    }

    /// Time-code tokens of one receiver in emission order
    pub fn tokens(&self, receiver: Receiver) -> impl Iterator<Item = &StandaloneToken> {
        self.on(receiver).iter().filter_map(DecodedItem::as_token)
    }

    pub fn len(&self) -> usize {
        self.a.len() + self.b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty() && self.b.is_empty()
    }

    /// Both streams merged in emission order, receiver A first on ties
    pub fn merged(&self) -> Vec<&DecodedItem> {
        let mut out = Vec::with_capacity(self.len());
        let (mut ia, mut ib) = (0, 0);
        while ia < self.a.len() && ib < self.b.len() {
            if self.a[ia].emitted_at() <= self.b[ib].emitted_at() {
                out.push(&self.a[ia]);
                ia += 1;
            } else {
                out.push(&self.b[ib]);
                ib += 1;
            }
        }
        out.extend(&self.a[ia..]);
        out.extend(&self.b[ib..]);
        out
    }
}
