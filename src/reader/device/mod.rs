//! Link Analyser device collaborator
//!
//! The acquisition controller talks to the hardware only through the
//! [`LinkAnalyser`] trait. The shipped implementation is the emulated
//! device in [`crate::data_source_emulator`]; a vendor-backed
//! implementation plugs in the same way.

pub mod error;

pub use error::DeviceError;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{AcquisitionState, Receiver, TraceEvent};
use crate::config::{CharacterClasses, TriggerEvent};

/// Format of the firmware build date in the capture header
pub const BUILD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Version number as reported by the device API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u8,
    pub minor: u8,
    pub edit: u8,
    pub patch: u8,
}

impl VersionInfo {
    pub fn new(major: u8, minor: u8, edit: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            edit,
            patch,
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{:02}", self.major, self.minor)?;
        if self.edit != 0 {
            write!(f, " edit {}", self.edit)?;
        }
        if self.patch != 0 {
            write!(f, " patch level {}", self.patch)?;
        }
        Ok(())
    }
}

/// Identification block printed in the capture header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub serial_number: String,
    pub api_version: VersionInfo,
    pub device_version: VersionInfo,
    pub firmware_version: VersionInfo,
    pub build_date: NaiveDateTime,
}

impl DeviceInfo {
    pub fn build_date_string(&self) -> String {
        self.build_date.format(BUILD_DATE_FORMAT).to_string()
    }
}

/// Capability set of a SpaceWire Link Analyser
///
/// Every call is blocking and has no timeout; a device that never answers
/// hangs the caller.
pub trait LinkAnalyser {
    /// Identification of the attached device
    fn info(&self) -> Result<DeviceInfo, DeviceError>;

    /// Select the character classes written to trace memory
    fn configure_character_classes(&mut self, classes: CharacterClasses) -> Result<(), DeviceError>;

    /// Record full packets (false) or only packet headers (true)
    fn set_record_only_header(&mut self, enabled: bool) -> Result<(), DeviceError>;

    /// Program the first stage of the trigger sequence
    fn configure_trigger_source(
        &mut self,
        receiver: Receiver,
        event: TriggerEvent,
    ) -> Result<(), DeviceError>;

    /// Number of events to keep recording after the trigger
    fn configure_post_trigger_depth(&mut self, count: u32) -> Result<(), DeviceError>;

    /// Abort any recording in progress and return to `Waiting`
    fn initialise_to_waiting(&mut self) -> Result<(), DeviceError>;

    fn start_recording(&mut self) -> Result<(), DeviceError>;

    fn poll_trigger_state(&mut self) -> Result<AcquisitionState, DeviceError>;

    /// End the acquisition window immediately
    fn force_trigger(&mut self) -> Result<(), DeviceError>;

    fn stop_recording(&mut self) -> Result<(), DeviceError>;

    /// Retrieve every recorded event and the capture clock period (seconds)
    fn fetch_all_events(&mut self) -> Result<(Vec<TraceEvent>, f64), DeviceError>;
}

impl<T: LinkAnalyser + ?Sized> LinkAnalyser for Box<T> {
    fn info(&self) -> Result<DeviceInfo, DeviceError> {
        (**self).info()
    }

    fn configure_character_classes(&mut self, classes: CharacterClasses) -> Result<(), DeviceError> {
        (**self).configure_character_classes(classes)
    }

    fn set_record_only_header(&mut self, enabled: bool) -> Result<(), DeviceError> {
        (**self).set_record_only_header(enabled)
    }

    fn configure_trigger_source(
        &mut self,
        receiver: Receiver,
        event: TriggerEvent,
    ) -> Result<(), DeviceError> {
        (**self).configure_trigger_source(receiver, event)
    }

    fn configure_post_trigger_depth(&mut self, count: u32) -> Result<(), DeviceError> {
        (**self).configure_post_trigger_depth(count)
    }

    fn initialise_to_waiting(&mut self) -> Result<(), DeviceError> {
        (**self).initialise_to_waiting()
    }

    fn start_recording(&mut self) -> Result<(), DeviceError> {
        (**self).start_recording()
    }

    fn poll_trigger_state(&mut self) -> Result<AcquisitionState, DeviceError> {
        (**self).poll_trigger_state()
    }

    fn force_trigger(&mut self) -> Result<(), DeviceError> {
        (**self).force_trigger()
    }

    fn stop_recording(&mut self) -> Result<(), DeviceError> {
        (**self).stop_recording()
    }

    fn fetch_all_events(&mut self) -> Result<(Vec<TraceEvent>, f64), DeviceError> {
        (**self).fetch_all_events()
    }
}

/// Pick the device with the given serial number
///
/// Devices whose identification cannot be read are skipped.
pub fn find_device<D, I>(devices: I, serial: &str) -> Result<D, DeviceError>
where
    D: LinkAnalyser,
    I: IntoIterator<Item = D>,
{
    let wanted = serial.trim();
    for device in devices {
        match device.info() {
            Ok(info) if info.serial_number == wanted => {
                debug!(serial = %wanted, name = %info.name, "Link Analyser found");
                return Ok(device);
            }
            Ok(info) => debug!(serial = %info.serial_number, "Skipping Link Analyser"),
            Err(e) => debug!(error = %e, "Skipping unreadable device"),
        }
    }
    Err(DeviceError::NotFound(wanted.to_string()))
}
