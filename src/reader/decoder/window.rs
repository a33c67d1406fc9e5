//! Pre-trigger windowing filter

/// Inclusion test on an event's time relative to the trigger
///
/// An event is inside the window iff `relative_ms >= -pre_trigger_ms`.
/// Without a configured horizon every event is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreTriggerWindow {
    pre_trigger_ms: Option<u32>,
}

impl PreTriggerWindow {
    pub fn new(pre_trigger_ms: u32) -> Self {
        Self {
            pre_trigger_ms: Some(pre_trigger_ms),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            pre_trigger_ms: None,
        }
    }

    pub fn pre_trigger_ms(&self) -> Option<u32> {
        self.pre_trigger_ms
    }

    /// Decide inclusion for a time in milliseconds relative to the trigger
    pub fn includes(&self, relative_ms: f64) -> bool {
        match self.pre_trigger_ms {
            Some(ms) => relative_ms >= -(ms as f64),
            None => true,
        }
    }

    /// Decide inclusion for a sample index and capture clock period
    pub fn includes_sample(&self, sample_index: i64, clock_period_s: f64) -> bool {
        self.includes(sample_index as f64 * clock_period_s * 1000.0)
    }
}
