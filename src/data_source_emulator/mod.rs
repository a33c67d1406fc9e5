//! Emulated Link Analyser - generates SpaceWire traffic for testing
//!
//! Implements [`LinkAnalyser`] without hardware. Two independent character
//! streams are synthesised per recording: packets (header, data,
//! EOP or occasional EEP) separated by idle gaps of NULLs and FCTs, with
//! periodic time-codes. The recording honours the character-class filter
//! and the trigger source like the real device:
//! - filtered characters are not stored; samples where neither receiver
//!   recorded anything are left out of the trace
//! - sample indices are re-based so the first matching trigger event after
//!   the pre-trigger span is index 0
//! - with no matching event the device never leaves `Started`

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use tracing::{debug, info};

use crate::common::{AcquisitionState, EventKind, Receiver, ReceiverEvent, TraceEvent};
use crate::config::{CharacterClasses, TriggerConfig, TriggerEvent};
use crate::reader::device::{DeviceError, DeviceInfo, LinkAnalyser, VersionInfo};

/// Emulator configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Serial number reported by the emulated device
    pub serial_number: String,
    pub device_name: String,
    /// RNG seed; equal seeds give identical recordings
    pub seed: u64,
    /// Character capture clock period in nanoseconds
    pub clock_period_ns: f64,
    /// Character slots recorded per run
    pub samples: usize,
    /// Slots before which the trigger condition is not armed
    pub pre_trigger_samples: usize,
    /// Packet length range in bytes, header included
    pub min_packet_bytes: usize,
    pub max_packet_bytes: usize,
    /// Mean idle gap between packets in slots
    pub mean_gap_slots: f64,
    pub eep_probability: f64,
    /// Chance that an idle slot carries an FCT instead of a NULL
    pub fct_probability: f64,
    /// Slots between time-codes (0 = no time-codes)
    pub timecode_interval: u64,
    /// Trigger-state polls answered with `Started` before `Triggered`
    pub polls_until_trigger: u32,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            serial_number: "EMU-0001".to_string(),
            device_name: "Emulated Link Analyser".to_string(),
            seed: 0x5350_5743,
            clock_period_ns: 12.5,
            samples: 20_000,
            pre_trigger_samples: 4_000,
            min_packet_bytes: 2,
            max_packet_bytes: 64,
            mean_gap_slots: 40.0,
            eep_probability: 0.02,
            fct_probability: 0.1,
            timecode_interval: 1_500,
            polls_until_trigger: 3,
        }
    }
}

/// Slot-by-slot generator for one receiver
struct StreamGenerator {
    rng: StdRng,
    gap: Option<Exp<f64>>,
    idle_left: u64,
    packet_left: Option<usize>,
    next_timecode: u64,
    timecode_value: u8,
}

impl StreamGenerator {
    fn new(config: &EmulatorConfig, seed: u64, timecode_phase: u64) -> Self {
        let gap = if config.mean_gap_slots > 0.0 {
            Exp::new(1.0 / config.mean_gap_slots).ok()
        } else {
            None
        };
        Self {
            rng: StdRng::seed_from_u64(seed),
            gap,
            idle_left: 0,
            packet_left: None,
            next_timecode: timecode_phase,
            timecode_value: 0,
        }
    }

    fn draw_gap(&mut self) -> u64 {
        match &self.gap {
            Some(exp) => exp.sample(&mut self.rng) as u64,
            None => 0,
        }
    }

    fn next(&mut self, slot: u64, config: &EmulatorConfig) -> ReceiverEvent {
        if config.timecode_interval > 0 && slot == self.next_timecode {
            self.next_timecode += config.timecode_interval;
            let value = self.timecode_value;
            self.timecode_value = (self.timecode_value + 1) & 0x3F;
            return ReceiverEvent::timecode(value);
        }

        match self.packet_left {
            Some(0) => {
                self.packet_left = None;
                self.idle_left = self.draw_gap();
                if self.rng.gen_bool(config.eep_probability.clamp(0.0, 1.0)) {
                    ReceiverEvent::eep()
                } else {
                    ReceiverEvent::eop()
                }
            }
            Some(n) => {
                self.packet_left = Some(n - 1);
                ReceiverEvent::data(self.rng.gen())
            }
            None if self.idle_left > 0 => {
                self.idle_left -= 1;
                if self.rng.gen_bool(config.fct_probability.clamp(0.0, 1.0)) {
                    ReceiverEvent::new(EventKind::Fct, 0)
                } else if self.rng.gen_bool(0.5) {
                    ReceiverEvent::new(EventKind::Null, 0)
                } else {
                    ReceiverEvent::idle()
                }
            }
            None => {
                let min = config.min_packet_bytes.max(1);
                let max = config.max_packet_bytes.max(min);
                let len = self.rng.gen_range(min..=max);
                self.packet_left = Some(len - 1);
                ReceiverEvent::header(self.rng.gen())
            }
        }
    }
}

/// Recording held in emulated trace memory
#[derive(Debug, Clone, Default)]
struct Recording {
    /// Slot-indexed events (not yet re-based)
    events: Vec<TraceEvent>,
    /// Position in `events` of the trigger event
    trigger_position: Option<usize>,
}

/// Emulated Link Analyser
pub struct EmulatedLinkAnalyser {
    config: EmulatorConfig,
    characters: CharacterClasses,
    trigger: TriggerConfig,
    post_trigger_depth: u32,
    state: AcquisitionState,
    polls: u32,
    runs: u64,
    injected: Option<(Vec<TraceEvent>, f64)>,
    recording: Recording,
}

impl EmulatedLinkAnalyser {
    /// Create an emulated device with the given configuration
    pub fn new(config: EmulatorConfig) -> Self {
        Self {
            config,
            characters: CharacterClasses::default(),
            trigger: TriggerConfig::default(),
            post_trigger_depth: 0,
            state: AcquisitionState::Waiting,
            polls: 0,
            runs: 0,
            injected: None,
            recording: Recording::default(),
        }
    }

    /// Emulated device that replays a fixed trace
    ///
    /// Sample indices are used as given (already trigger-relative); the
    /// device triggers after `polls_until_trigger` polls.
    pub fn with_trace(config: EmulatorConfig, events: Vec<TraceEvent>, clock_period_s: f64) -> Self {
        let mut device = Self::new(config);
        device.injected = Some((events, clock_period_s));
        device
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    fn clock_period_s(&self) -> f64 {
        match &self.injected {
            Some((_, period)) => *period,
            None => self.config.clock_period_ns * 1e-9,
        }
    }

    /// Synthesise one recording with the current filter, slot-indexed
    pub fn generate(&self, run: u64) -> Vec<TraceEvent> {
        let seed = self.config.seed.wrapping_add(run.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let phase_b = self.config.timecode_interval / 2;
        let mut gen_a = StreamGenerator::new(&self.config, seed, 0);
        let mut gen_b = StreamGenerator::new(&self.config, seed ^ 0xB, phase_b);

        let mut events = Vec::with_capacity(self.config.samples);
        for slot in 0..self.config.samples as u64 {
            let a = self.filter(gen_a.next(slot, &self.config));
            let b = self.filter(gen_b.next(slot, &self.config));
            if a.kind == EventKind::NoCharacter && b.kind == EventKind::NoCharacter {
                continue;
            }
            events.push(TraceEvent::new(slot as i64, a, b));
        }
        events
    }

    fn filter(&self, event: ReceiverEvent) -> ReceiverEvent {
        if self.characters.records(event.kind) {
            event
        } else {
            ReceiverEvent::idle()
        }
    }

    fn find_trigger(&self, events: &[TraceEvent], armed_from: i64) -> Option<usize> {
        events.iter().position(|ev| {
            ev.sample_index >= armed_from && self.trigger.event.matches(ev.on(self.trigger.receiver).kind)
        })
    }

    fn require_waiting(&self, command: &'static str) -> Result<(), DeviceError> {
        if self.state != AcquisitionState::Waiting {
            return Err(DeviceError::command(command, format!("device is {}", self.state)));
        }
        Ok(())
    }
}

impl LinkAnalyser for EmulatedLinkAnalyser {
    fn info(&self) -> Result<DeviceInfo, DeviceError> {
        let build_date = NaiveDate::from_ymd_opt(2024, 1, 31)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap_or_default();
        Ok(DeviceInfo {
            name: self.config.device_name.clone(),
            serial_number: self.config.serial_number.clone(),
            api_version: VersionInfo::new(4, 5, 0, 0),
            device_version: VersionInfo::new(3, 0, 0, 0),
            firmware_version: VersionInfo::new(1, 12, 3, 0),
            build_date,
        })
    }

    fn configure_character_classes(&mut self, classes: CharacterClasses) -> Result<(), DeviceError> {
        self.characters = classes;
        Ok(())
    }

    fn set_record_only_header(&mut self, enabled: bool) -> Result<(), DeviceError> {
        if enabled {
            return Err(DeviceError::command(
                "SetRecordOnlyPacketHeader",
                "header-only recording is not emulated",
            ));
        }
        Ok(())
    }

    fn configure_trigger_source(
        &mut self,
        receiver: Receiver,
        event: TriggerEvent,
    ) -> Result<(), DeviceError> {
        self.trigger = TriggerConfig { receiver, event };
        Ok(())
    }

    fn configure_post_trigger_depth(&mut self, count: u32) -> Result<(), DeviceError> {
        self.post_trigger_depth = count;
        Ok(())
    }

    fn initialise_to_waiting(&mut self) -> Result<(), DeviceError> {
        self.state = AcquisitionState::Waiting;
        self.polls = 0;
        self.recording = Recording::default();
        Ok(())
    }

    fn start_recording(&mut self) -> Result<(), DeviceError> {
        self.require_waiting("StartRecording")?;

        let recording = match &self.injected {
            Some((events, _)) => Recording {
                events: events.clone(),
                trigger_position: events.iter().position(|ev| ev.sample_index >= 0),
            },
            None => {
                let events = self.generate(self.runs);
                let trigger_position =
                    self.find_trigger(&events, self.config.pre_trigger_samples as i64);
                Recording {
                    events,
                    trigger_position,
                }
            }
        };
        self.runs += 1;

        info!(
            events = recording.events.len(),
            trigger = ?recording.trigger_position,
            receiver = %self.trigger.receiver,
            event = %self.trigger.event,
            "Emulated recording started"
        );
        self.recording = recording;
        self.state = AcquisitionState::Started;
        self.polls = 0;
        Ok(())
    }

    fn poll_trigger_state(&mut self) -> Result<AcquisitionState, DeviceError> {
        if self.state == AcquisitionState::Started
            && self.recording.trigger_position.is_some()
            && self.polls >= self.config.polls_until_trigger
        {
            self.state = AcquisitionState::Triggered;
            debug!(polls = self.polls, "Emulated trigger");
        }
        self.polls = self.polls.saturating_add(1);
        Ok(self.state)
    }

    fn force_trigger(&mut self) -> Result<(), DeviceError> {
        match self.state {
            AcquisitionState::Started | AcquisitionState::Triggered => {
                if self.recording.trigger_position.is_none() && !self.recording.events.is_empty() {
                    // Forced without a natural trigger: the last sample becomes the anchor
                    self.recording.trigger_position = Some(self.recording.events.len() - 1);
                }
                self.state = AcquisitionState::Complete;
                Ok(())
            }
            AcquisitionState::Complete => Ok(()),
            AcquisitionState::Waiting => Err(DeviceError::command("ForceTrigger", "not recording")),
        }
    }

    fn stop_recording(&mut self) -> Result<(), DeviceError> {
        self.state = AcquisitionState::Waiting;
        Ok(())
    }

    fn fetch_all_events(&mut self) -> Result<(Vec<TraceEvent>, f64), DeviceError> {
        if self.state != AcquisitionState::Complete {
            return Err(DeviceError::NotComplete);
        }

        let period = self.clock_period_s();
        if self.injected.is_some() {
            return Ok((self.recording.events.clone(), period));
        }

        let origin = self
            .recording
            .trigger_position
            .and_then(|pos| self.recording.events.get(pos))
            .map(|ev| ev.sample_index)
            .unwrap_or(0);
        // Post-trigger memory limit (0 = until forced)
        let keep = match (self.post_trigger_depth, self.recording.trigger_position) {
            (0, _) | (_, None) => self.recording.events.len(),
            (depth, Some(pos)) => pos + 1 + depth as usize,
        };
        let events = self
            .recording
            .events
            .iter()
            .take(keep)
            .map(|ev| TraceEvent {
                sample_index: ev.sample_index - origin,
                ..*ev
            })
            .collect();
        Ok((events, period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> EmulatorConfig {
        EmulatorConfig {
            samples: 5_000,
            pre_trigger_samples: 1_000,
            timecode_interval: 700,
            polls_until_trigger: 2,
            ..EmulatorConfig::default()
        }
    }

    fn record(device: &mut EmulatedLinkAnalyser) -> Vec<TraceEvent> {
        device.initialise_to_waiting().unwrap();
        device.start_recording().unwrap();
        while !device.poll_trigger_state().unwrap().has_triggered() {}
        device.force_trigger().unwrap();
        device.fetch_all_events().unwrap().0
    }

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.serial_number, "EMU-0001");
        assert_eq!(config.clock_period_ns, 12.5);
        assert!(config.min_packet_bytes <= config.max_packet_bytes);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let device = EmulatedLinkAnalyser::new(small_config());
        assert_eq!(device.generate(0), device.generate(0));
        assert_ne!(device.generate(0), device.generate(1));
    }

    #[test]
    fn test_trigger_on_timecode_rebases_indices() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        device.configure_trigger_source(Receiver::B, TriggerEvent::Timecode).unwrap();
        let events = record(&mut device);

        let trigger = events.iter().find(|ev| ev.sample_index == 0).unwrap();
        assert_eq!(trigger.link_b.kind, EventKind::Timecode);
        assert!(events.first().unwrap().sample_index < -1_000);
        assert!(events.windows(2).all(|w| w[0].sample_index < w[1].sample_index));
    }

    #[test]
    fn test_trigger_polls() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        device.start_recording().unwrap();
        assert_eq!(device.poll_trigger_state().unwrap(), AcquisitionState::Started);
        assert_eq!(device.poll_trigger_state().unwrap(), AcquisitionState::Started);
        assert_eq!(device.poll_trigger_state().unwrap(), AcquisitionState::Triggered);
    }

    #[test]
    fn test_never_triggers_without_match() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        // Time-codes are not recorded, so the time-code trigger never fires
        device
            .configure_character_classes(CharacterClasses::from_mask(0b0101).unwrap())
            .unwrap();
        device.start_recording().unwrap();
        for _ in 0..20 {
            assert_eq!(device.poll_trigger_state().unwrap(), AcquisitionState::Started);
        }
    }

    #[test]
    fn test_character_filter_applied() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        device
            .configure_character_classes(CharacterClasses::from_mask(0b0011).unwrap())
            .unwrap();
        let events = record(&mut device);
        assert!(!events.is_empty());
        for ev in &events {
            for receiver in Receiver::ALL {
                let kind = ev.on(receiver).kind;
                assert!(kind != EventKind::Fct && kind != EventKind::Null, "{:?}", kind);
            }
        }
    }

    #[test]
    fn test_fetch_before_complete_fails() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        device.start_recording().unwrap();
        assert_eq!(device.fetch_all_events().unwrap_err(), DeviceError::NotComplete);
    }

    #[test]
    fn test_injected_trace_is_replayed() {
        let events = vec![
            TraceEvent::new(-1, ReceiverEvent::header(1), ReceiverEvent::idle()),
            TraceEvent::new(0, ReceiverEvent::eop(), ReceiverEvent::timecode(3)),
        ];
        let mut device = EmulatedLinkAnalyser::with_trace(small_config(), events.clone(), 1e-8);
        let (fetched, period) = {
            device.start_recording().unwrap();
            device.force_trigger().unwrap();
            device.fetch_all_events().unwrap()
        };
        assert_eq!(fetched, events);
        assert_eq!(period, 1e-8);
    }

    #[test]
    fn test_post_trigger_depth_limits_trace() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        device.configure_post_trigger_depth(10).unwrap();
        let events = record(&mut device);
        assert_eq!(events.iter().filter(|ev| ev.sample_index > 0).count(), 10);
    }

    #[test]
    fn test_header_only_not_supported() {
        let mut device = EmulatedLinkAnalyser::new(small_config());
        assert!(device.set_record_only_header(false).is_ok());
        assert!(device.set_record_only_header(true).is_err());
    }
}
