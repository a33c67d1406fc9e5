//! Acquisition state of the Link Analyser trigger state machine
//!
//! Mirrors the four states reported by the device while a capture is in
//! progress. The controller tracks its own copy and only moves along the
//! transitions allowed by [`AcquisitionState::can_transition_to`].

use serde::{Deserialize, Serialize};

/// Trigger state of an acquisition run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquisitionState {
    /// Device idle, memory cleared, not recording
    #[default]
    Waiting,
    /// Recording, waiting for the trigger condition
    Started,
    /// Trigger condition met, filling post-trigger memory
    Triggered,
    /// Recording finished, memory holds the trace
    Complete,
}

impl AcquisitionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: AcquisitionState) -> bool {
        use AcquisitionState::*;
        matches!(
            (self, target),
            (Waiting, Started)        // start recording
            | (Started, Triggered)    // hardware trigger condition met
            | (Triggered, Complete)   // forced or natural completion
            | (Started, Complete)     // trigger and completion seen in one poll
            // Re-initialise from any state
            | (Started, Waiting)
            | (Triggered, Waiting)
            | (Complete, Waiting)
        )
    }

    /// True once the trigger has fired (Triggered or Complete)
    pub fn has_triggered(&self) -> bool {
        matches!(self, Self::Triggered | Self::Complete)
    }
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionState::Waiting => write!(f, "Waiting"),
            AcquisitionState::Started => write!(f, "Started"),
            AcquisitionState::Triggered => write!(f, "Triggered"),
            AcquisitionState::Complete => write!(f, "Complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_flow() {
        use AcquisitionState::*;
        assert!(Waiting.can_transition_to(Started));
        assert!(Started.can_transition_to(Triggered));
        assert!(Triggered.can_transition_to(Complete));
    }

    #[test]
    fn test_invalid_transitions() {
        use AcquisitionState::*;
        assert!(!Waiting.can_transition_to(Triggered));
        assert!(!Waiting.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Started));
        assert!(!Triggered.can_transition_to(Started));
    }

    #[test]
    fn test_reinitialise_from_any_active_state() {
        use AcquisitionState::*;
        for state in [Started, Triggered, Complete] {
            assert!(state.can_transition_to(Waiting), "{} -> Waiting", state);
        }
    }

    #[test]
    fn test_has_triggered() {
        assert!(!AcquisitionState::Started.has_triggered());
        assert!(AcquisitionState::Triggered.has_triggered());
        assert!(AcquisitionState::Complete.has_triggered());
    }
}
