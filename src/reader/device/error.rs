//! Link Analyser error handling

use thiserror::Error;

/// Failure reported by the Link Analyser collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// No attached device has the requested serial number
    #[error("Link Analyser {0} not found")]
    NotFound(String),

    /// The device rejected or failed a command
    #[error("{command} failed: {reason}")]
    CommandFailed {
        command: &'static str,
        reason: String,
    },

    /// The trace was requested before the recording finished
    #[error("recording not complete")]
    NotComplete,
}

impl DeviceError {
    /// Create a command failure
    pub fn command(command: &'static str, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display() {
        let err = DeviceError::command("StartRecording", "device is Started");
        assert_eq!(err.to_string(), "StartRecording failed: device is Started");
    }

    #[test]
    fn test_not_found_display() {
        let err = DeviceError::NotFound("LA3-0001".to_string());
        assert_eq!(err.to_string(), "Link Analyser LA3-0001 not found");
    }
}
