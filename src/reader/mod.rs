//! Reader module for Link Analyser acquisition
//!
//! This module provides:
//! - The device collaborator trait and device errors (device)
//! - Trace decoding into packets and time-codes (decoder)
//! - The trigger acquisition controller that drives one capture run
//!
//! A run moves the device through `Waiting -> Started -> Triggered ->
//! Complete`. The host wall clock is sampled as soon as the trigger is
//! seen; that instant anchors every timestamp in the trace. After the
//! trigger the controller sleeps for the configured duration and then
//! forces the trigger so every capture has the same length.

pub mod decoder;
pub mod device;

pub use decoder::{DecodedItem, DecodedTrace, PreTriggerWindow, TraceDecoder};
pub use device::{find_device, DeviceError, DeviceInfo, LinkAnalyser, VersionInfo};

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::{AcquisitionState, CapturedTrace, Timestamp};
use crate::config::{CharacterClasses, Config, TriggerConfig};

/// Reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: AcquisitionState,
        to: AcquisitionState,
    },

    #[error("Operation requires state {expected}, current state is {actual}")]
    WrongState {
        expected: AcquisitionState,
        actual: AcquisitionState,
    },

    #[error("Timing error: {0}")]
    Timing(String),
}

/// Acquisition parameters, fixed for the lifetime of a controller
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionSettings {
    pub characters: CharacterClasses,
    pub trigger: TriggerConfig,
    pub post_trigger_depth: u32,
    /// Post-trigger hold in seconds
    pub duration_s: f64,
    pub poll_interval: Duration,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            characters: CharacterClasses::default(),
            trigger: TriggerConfig::default(),
            post_trigger_depth: 0,
            duration_s: 1.0,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl AcquisitionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            characters: config.capture.characters,
            trigger: config.trigger,
            post_trigger_depth: config.capture.post_trigger_depth,
            duration_s: config.capture.duration_s,
            poll_interval: Duration::from_millis(config.capture.trigger_poll_interval_ms),
        }
    }
}

/// Split a duration in seconds into its whole-second and nanosecond parts
fn split_duration(seconds: f64) -> Result<(Duration, Duration), ReaderError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ReaderError::Timing(format!(
            "invalid capture duration {}s",
            seconds
        )));
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u64;
    Ok((Duration::from_secs(whole as u64), Duration::from_nanos(nanos)))
}

/// Drives one Link Analyser through a capture run
pub struct AcquisitionController<D: LinkAnalyser> {
    device: D,
    settings: AcquisitionSettings,
    state: AcquisitionState,
    trigger_time: Option<Timestamp>,
}

impl<D: LinkAnalyser> AcquisitionController<D> {
    pub fn new(device: D, settings: AcquisitionSettings) -> Self {
        Self {
            device,
            settings,
            state: AcquisitionState::Waiting,
            trigger_time: None,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    /// Host wall-clock instant of the trigger, once seen
    pub fn trigger_time(&self) -> Option<Timestamp> {
        self.trigger_time
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    fn transition(&mut self, to: AcquisitionState) -> Result<(), ReaderError> {
        if self.state == to {
            return Ok(());
        }
        if !self.state.can_transition_to(to) {
            return Err(ReaderError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        info!(from = %self.state, to = %to, "State transition");
        self.state = to;
        Ok(())
    }

    fn expect_state(&self, expected: AcquisitionState) -> Result<(), ReaderError> {
        if self.state != expected {
            return Err(ReaderError::WrongState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Program recording and trigger settings, then reset the device to
    /// `Waiting`
    fn configure(&mut self) -> Result<(), ReaderError> {
        let s = &self.settings;
        debug!(
            chars = s.characters.to_mask(),
            receiver = %s.trigger.receiver,
            event = %s.trigger.event,
            post_trigger_depth = s.post_trigger_depth,
            "Configuring Link Analyser"
        );
        self.device.configure_character_classes(s.characters)?;
        self.device.set_record_only_header(false)?;
        self.device
            .configure_trigger_source(s.trigger.receiver, s.trigger.event)?;
        self.device.configure_post_trigger_depth(s.post_trigger_depth)?;
        self.device.initialise_to_waiting()?;

        self.state = AcquisitionState::Waiting;
        self.trigger_time = None;
        Ok(())
    }

    /// Configure the device and start recording
    pub fn start_acquisition(&mut self) -> Result<(), ReaderError> {
        self.configure()?;
        self.device.start_recording()?;
        self.transition(AcquisitionState::Started)?;
        info!("Recording started, waiting for trigger");
        Ok(())
    }

    /// Poll until the device reports the trigger and return the host time
    /// at which it was seen
    ///
    /// There is no timeout: a trigger condition that never occurs blocks
    /// forever.
    pub fn await_trigger(&mut self) -> Result<Timestamp, ReaderError> {
        self.expect_state(AcquisitionState::Started)?;
        let mut polls: u64 = 0;
        loop {
            let state = self.device.poll_trigger_state()?;
            if state.has_triggered() {
                let now = Timestamp::now();
                self.trigger_time = Some(now);
                self.transition(state)?;
                info!(polls, state = %state, "Trigger detected");
                return Ok(now);
            }
            polls += 1;
            if !self.settings.poll_interval.is_zero() {
                std::thread::sleep(self.settings.poll_interval);
            }
        }
    }

    /// Sleep for the configured post-trigger duration, then force the
    /// trigger
    ///
    /// The sleep cannot be cancelled.
    pub fn hold_for_configured_duration(&mut self) -> Result<(), ReaderError> {
        let (whole, fraction) = split_duration(self.settings.duration_s)?;
        info!(seconds = self.settings.duration_s, "Recording post-trigger traffic");
        std::thread::sleep(whole);
        std::thread::sleep(fraction);
        self.force_trigger()
    }

    /// End the acquisition window now
    pub fn force_trigger(&mut self) -> Result<(), ReaderError> {
        self.device.force_trigger()?;
        self.transition(AcquisitionState::Complete)?;
        if self.trigger_time.is_none() {
            // Trigger forced before the hardware condition was met
            let now = Timestamp::now();
            self.trigger_time = Some(now);
        }
        Ok(())
    }

    /// Retrieve the recorded trace once acquisition is complete
    pub fn fetch_trace(&mut self) -> Result<CapturedTrace, ReaderError> {
        self.expect_state(AcquisitionState::Complete)?;
        let trigger_time = self.trigger_time.unwrap_or_else(Timestamp::now);

        let (events, clock_period_s) = self.device.fetch_all_events()?;
        let trace = CapturedTrace::new(events, clock_period_s, trigger_time);
        if !trace.is_monotonic() {
            warn!("Trace sample indices are not strictly increasing");
        }
        info!(
            events = trace.len(),
            clock_period_ns = clock_period_s * 1e9,
            "Trace retrieved"
        );
        Ok(trace)
    }

    /// Run a complete acquisition and return the trace
    ///
    /// Any failure after recording started stops the recording before the
    /// error is returned.
    pub fn run(&mut self) -> Result<CapturedTrace, ReaderError> {
        self.start_acquisition()?;

        match self.capture() {
            Ok(trace) => {
                self.stop();
                Ok(trace)
            }
            Err(e) => {
                warn!(error = %e, "Acquisition failed, stopping recording");
                self.stop();
                Err(e)
            }
        }
    }

    fn capture(&mut self) -> Result<CapturedTrace, ReaderError> {
        self.await_trigger()?;
        self.hold_for_configured_duration()?;
        self.fetch_trace()
    }

    /// Best-effort stop; errors are logged only
    fn stop(&mut self) {
        if let Err(e) = self.device.stop_recording() {
            warn!(error = %e, "Failed to stop recording");
        }
    }
}
