//! Packet reassembler
//!
//! Rebuilds SpaceWire packets from the flat per-sample trace. Each receiver
//! is decoded by its own [`ReceiverDecoder`]; the two share the input trace
//! but no decode state, so framing on one link never affects the other.
//!
//! Per receiver and per in-window event:
//! - Header outside a packet opens a packet (header byte is byte 0)
//! - Data inside a packet appends its byte
//! - EOP/EEP inside a packet closes and emits it
//! - Time-code is emitted as a standalone token, packet state untouched
//! - everything else is a control signal and ignored for framing
//!
//! Events outside the pre-trigger window are skipped before any of the
//! above, so a packet whose Header falls before the window is never opened.
//! A packet still open when the trace ends is emitted as `Incomplete`.

use tracing::{debug, warn};

use super::common::{DecodedItem, DecodedTrace, ReconstructedPacket, StandaloneToken, Terminator};
use super::window::PreTriggerWindow;
use crate::common::{CapturedTrace, EventKind, Receiver, ReceiverEvent, Timestamp, TraceEvent};

/// In-window trace event as seen by the pass-through observer
#[derive(Debug, Clone, Copy)]
pub struct WindowedEvent<'a> {
    /// Position of the event in the trace buffer
    pub position: usize,
    /// Time relative to the trigger in milliseconds
    pub relative_ms: f64,
    pub event: &'a TraceEvent,
}

/// Framing state machine for one receiver
#[derive(Debug)]
pub struct ReceiverDecoder {
    receiver: Receiver,
    open: Option<ReconstructedPacket>,
    items: Vec<DecodedItem>,
}

impl ReceiverDecoder {
    pub fn new(receiver: Receiver) -> Self {
        Self {
            receiver,
            open: None,
            items: Vec::new(),
        }
    }

    /// Feed one in-window event; `timestamp` is evaluated only when a record
    /// needs it
    pub fn push<F>(&mut self, sample_index: i64, event: &ReceiverEvent, timestamp: F)
    where
        F: FnOnce() -> Timestamp,
    {
        match event.kind {
            EventKind::Header => {
                if self.open.is_none() {
                    self.open = Some(ReconstructedPacket::open(
                        self.receiver,
                        sample_index,
                        timestamp(),
                        event.data,
                    ));
                }
            }
            EventKind::Data => {
                if let Some(packet) = self.open.as_mut() {
                    packet.bytes.push(event.data);
                }
            }
            EventKind::Eop | EventKind::Eep => {
                if let Some(mut packet) = self.open.take() {
                    packet.end_index = Some(sample_index);
                    packet.terminator =
                        Terminator::from_kind(event.kind).unwrap_or(Terminator::Incomplete);
                    self.items.push(DecodedItem::Packet(packet));
                }
            }
            EventKind::Timecode => {
                self.items.push(DecodedItem::Token(StandaloneToken {
                    receiver: self.receiver,
                    kind: EventKind::Timecode,
                    value: event.data,
                    timestamp: timestamp(),
                    sample_index,
                }));
            }
            EventKind::Unknown(code) => {
                warn!(
                    receiver = %self.receiver,
                    sample_index,
                    code,
                    "Unknown event kind, skipping"
                );
            }
            _ => {}
        }
    }

    /// End of trace: flush a still-open packet as incomplete
    pub fn finish(mut self) -> Vec<DecodedItem> {
        if let Some(packet) = self.open.take() {
            warn!(
                receiver = %self.receiver,
                start_index = packet.start_index,
                bytes = packet.len(),
                "Trace ended inside a packet"
            );
            self.items.push(DecodedItem::Packet(packet));
        }
        self.items
    }
}

/// Decodes a complete captured trace into packets and time-code tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceDecoder {
    window: PreTriggerWindow,
}

impl TraceDecoder {
    pub fn new(window: PreTriggerWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> PreTriggerWindow {
        self.window
    }

    /// Decode both receivers
    pub fn decode(&self, trace: &CapturedTrace) -> DecodedTrace {
        self.decode_with_observer(trace, |_| {})
    }

    /// Decode both receivers, handing every in-window event to `observer`
    /// in trace order during the same pass
    pub fn decode_with_observer<F>(&self, trace: &CapturedTrace, mut observer: F) -> DecodedTrace
    where
        F: FnMut(&WindowedEvent<'_>),
    {
        let mut a = ReceiverDecoder::new(Receiver::A);
        let mut b = ReceiverDecoder::new(Receiver::B);
        let mut skipped = 0usize;

        for (position, event) in trace.events.iter().enumerate() {
            let relative_ms = trace.relative_seconds(event.sample_index) * 1000.0;
            if !self.window.includes(relative_ms) {
                skipped += 1;
                continue;
            }

            observer(&WindowedEvent {
                position,
                relative_ms,
                event,
            });

            let at = || trace.timestamp_of(event.sample_index);
            a.push(event.sample_index, &event.link_a, at);
            b.push(event.sample_index, &event.link_b, at);
        }

        let decoded = DecodedTrace {
            a: a.finish(),
            b: b.finish(),
        };
        debug!(
            events = trace.len(),
            outside_window = skipped,
            records_a = decoded.a.len(),
            records_b = decoded.b.len(),
            "Trace decoded"
        );
        decoded
    }

    /// Decode a single receiver on its own
    pub fn decode_receiver(&self, trace: &CapturedTrace, receiver: Receiver) -> Vec<DecodedItem> {
        let mut decoder = ReceiverDecoder::new(receiver);
        for event in &trace.events {
            if !self.window.includes_sample(event.sample_index, trace.clock_period_s) {
                continue;
            }
            decoder.push(event.sample_index, event.on(receiver), || {
                trace.timestamp_of(event.sample_index)
            });
        }
        decoder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const PERIOD: f64 = 1.0 / 1_048_576.0;

    fn trace_of(events: Vec<TraceEvent>) -> CapturedTrace {
        CapturedTrace::new(events, PERIOD, Timestamp::new(1_000, 0))
    }

    /// Trace with receiver B idle
    fn a_only(stream: &[ReceiverEvent]) -> CapturedTrace {
        trace_of(
            stream
                .iter()
                .enumerate()
                .map(|(i, ev)| TraceEvent::new(i as i64, *ev, ReceiverEvent::idle()))
                .collect(),
        )
    }

    fn packets(items: &[DecodedItem]) -> Vec<&ReconstructedPacket> {
        items.iter().filter_map(DecodedItem::as_packet).collect()
    }

    #[test]
    fn test_header_data_eop_roundtrip() {
        let payload = [0x42u8, 0x00, 0xFF, 0x10, 0x7E];
        let mut stream = vec![ReceiverEvent::header(payload[0])];
        stream.extend(payload[1..].iter().map(|b| ReceiverEvent::data(*b)));
        stream.push(ReceiverEvent::eop());

        let decoded = TraceDecoder::default().decode(&a_only(&stream));
        let out = packets(&decoded.a);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bytes, payload);
        assert_eq!(out[0].terminator, Terminator::Eop);
        assert_eq!(out[0].start_index, 0);
        assert_eq!(out[0].end_index, Some(payload.len() as i64));
        assert!(decoded.b.is_empty());
    }

    #[test]
    fn test_eep_terminator() {
        let stream = [ReceiverEvent::header(0x01), ReceiverEvent::eep()];
        let decoded = TraceDecoder::default().decode(&a_only(&stream));
        assert_eq!(packets(&decoded.a)[0].terminator, Terminator::Eep);
    }

    #[test]
    fn test_trailing_incomplete_packet() {
        let stream = [ReceiverEvent::header(0x05), ReceiverEvent::data(0x06)];
        let decoded = TraceDecoder::default().decode(&a_only(&stream));
        let out = packets(&decoded.a);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].terminator, Terminator::Incomplete);
        assert_eq!(out[0].bytes, vec![0x05, 0x06]);
        assert_eq!(decoded.a[0].emitted_at(), i64::MAX);
    }

    #[test]
    fn test_receiver_independence() {
        let interleaved = trace_of(vec![
            TraceEvent::new(0, ReceiverEvent::header(0x01), ReceiverEvent::header(0x10)),
            TraceEvent::new(1, ReceiverEvent::data(0x02), ReceiverEvent::eop()),
            TraceEvent::new(2, ReceiverEvent::eop(), ReceiverEvent::idle()),
        ]);
        let decoder = TraceDecoder::default();
        let decoded = decoder.decode(&interleaved);

        let a = packets(&decoded.a);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].bytes, vec![0x01, 0x02]);
        assert_eq!(a[0].terminator, Terminator::Eop);

        let b = packets(&decoded.b);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].bytes, vec![0x10]);
        assert_eq!(b[0].terminator, Terminator::Eop);

        // Same packets as decoding each receiver alone
        let a_alone = a_only(&[ReceiverEvent::header(0x01), ReceiverEvent::data(0x02), ReceiverEvent::eop()]);
        assert_eq!(packets(&decoder.decode(&a_alone).a)[0].bytes, a[0].bytes);
        assert_eq!(decoder.decode_receiver(&interleaved, Receiver::B), decoded.b);
        assert_eq!(decoder.decode_receiver(&interleaved, Receiver::A), decoded.a);
    }

    #[test]
    fn test_timecode_inside_packet_does_not_interrupt() {
        let stream = [
            ReceiverEvent::header(0x01),
            ReceiverEvent::timecode(0x3F),
            ReceiverEvent::data(0x02),
            ReceiverEvent::new(EventKind::Fct, 0),
            ReceiverEvent::new(EventKind::Null, 0),
            ReceiverEvent::eop(),
        ];
        let decoded = TraceDecoder::default().decode(&a_only(&stream));
        assert_eq!(decoded.a.len(), 2);
        let token = decoded.a[0].as_token().unwrap();
        assert_eq!(token.value, 0x3F);
        assert_eq!(token.sample_index, 1);
        assert_eq!(packets(&decoded.a)[0].bytes, vec![0x01, 0x02]);
    }

    #[test]
    fn test_stray_data_and_terminators_ignored() {
        let stream = [
            ReceiverEvent::data(0xAA),
            ReceiverEvent::eop(),
            ReceiverEvent::header(0x01),
            ReceiverEvent::header(0x02),
            ReceiverEvent::new(EventKind::Unknown(99), 0x55),
            ReceiverEvent::eop(),
            ReceiverEvent::eep(),
        ];
        let decoded = TraceDecoder::default().decode(&a_only(&stream));
        let out = packets(&decoded.a);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].bytes, vec![0x01]);
    }

    #[test]
    fn test_zero_window_drops_pre_trigger_header() {
        // Header before the trigger, Data/EOP after: the packet is never opened
        let trace = trace_of(vec![
            TraceEvent::new(-2, ReceiverEvent::timecode(1), ReceiverEvent::idle()),
            TraceEvent::new(-1, ReceiverEvent::header(0x01), ReceiverEvent::idle()),
            TraceEvent::new(0, ReceiverEvent::data(0x02), ReceiverEvent::timecode(2)),
            TraceEvent::new(1, ReceiverEvent::eop(), ReceiverEvent::idle()),
            TraceEvent::new(2, ReceiverEvent::header(0x03), ReceiverEvent::idle()),
            TraceEvent::new(3, ReceiverEvent::eop(), ReceiverEvent::idle()),
        ]);
        let decoded = TraceDecoder::new(PreTriggerWindow::new(0)).decode(&trace);

        let a = packets(&decoded.a);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].bytes, vec![0x03]);
        assert!(decoded.tokens(Receiver::A).next().is_none());
        assert_eq!(decoded.tokens(Receiver::B).count(), 1);

        for item in decoded.merged() {
            let index = match item {
                DecodedItem::Packet(p) => p.start_index,
                DecodedItem::Token(t) => t.sample_index,
            };
            assert!(trace.relative_seconds(index) >= 0.0);
        }
    }

    #[test]
    fn test_observer_sees_in_window_events_in_order() {
        let trace = trace_of(vec![
            TraceEvent::new(-5000, ReceiverEvent::header(0x01), ReceiverEvent::idle()),
            TraceEvent::new(-10, ReceiverEvent::data(0x02), ReceiverEvent::idle()),
            TraceEvent::new(0, ReceiverEvent::timecode(0), ReceiverEvent::timecode(0)),
        ]);
        // 1 ms = 1048.576 samples
        let mut seen = Vec::new();
        TraceDecoder::new(PreTriggerWindow::new(1)).decode_with_observer(&trace, |ev| {
            seen.push((ev.position, ev.event.sample_index));
        });
        assert_eq!(seen, vec![(1, -10), (2, 0)]);
    }

    #[test]
    fn test_packet_timestamp_from_header() {
        let trace = CapturedTrace::new(
            vec![
                TraceEvent::new(0, ReceiverEvent::idle(), ReceiverEvent::header(0x01)),
                TraceEvent::new(2, ReceiverEvent::idle(), ReceiverEvent::eop()),
            ],
            0.1,
            Timestamp::new(10, 900_000_000),
        );
        let decoded = TraceDecoder::default().decode(&trace);
        let packet = decoded.packets(Receiver::B).next().unwrap();
        assert_eq!(packet.start_timestamp, Timestamp::new(10, 900_000_000));
    }

    #[test]
    fn test_completed_packet_count_matches_opening_headers() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let kinds = [
            EventKind::Header,
            EventKind::Data,
            EventKind::Data,
            EventKind::Data,
            EventKind::Eop,
            EventKind::Eep,
            EventKind::Timecode,
            EventKind::Fct,
            EventKind::NoCharacter,
        ];

        for _ in 0..50 {
            let len = rng.gen_range(0..400);
            let events: Vec<TraceEvent> = (0..len)
                .map(|i| {
                    let a = ReceiverEvent::new(kinds[rng.gen_range(0..kinds.len())], rng.gen());
                    let b = ReceiverEvent::new(kinds[rng.gen_range(0..kinds.len())], rng.gen());
                    TraceEvent::new(i as i64 - 200, a, b)
                })
                .collect();
            let trace = trace_of(events);
            let decoded = TraceDecoder::default().decode(&trace);

            for receiver in Receiver::ALL {
                // Count headers that open a packet which is later terminated
                let mut open = false;
                let mut expected = 0;
                for ev in &trace.events {
                    match ev.on(receiver).kind {
                        EventKind::Header if !open => open = true,
                        EventKind::Eop | EventKind::Eep if open => {
                            open = false;
                            expected += 1;
                        }
                        _ => {}
                    }
                }
                let terminated = decoded.packets(receiver).filter(|p| p.is_terminated()).count();
                let incomplete = decoded.packets(receiver).filter(|p| !p.is_terminated()).count();
                assert_eq!(terminated, expected);
                assert_eq!(incomplete, open as usize);
            }
        }
    }
}
