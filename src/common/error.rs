//! Crate-level error type for a complete capture run
//!
//! Each component keeps its own error enum; `PipelineError` wraps them so
//! a run can be driven end to end with `?`.

use thiserror::Error;

use crate::archiver::ArchiveError;
use crate::config::ConfigError;
use crate::reader::device::DeviceError;
use crate::reader::ReaderError;

/// Errors that abort a capture run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Device could not be found or opened
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Acquisition failed
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] ReaderError),

    /// Archive transport could not be set up
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Writing the hexdump or event log failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
