//! Error types for the MPSSE backend

use ftxfer_core::Status;
use thiserror::Error;

/// Result type for MPSSE operations
pub type Result<T> = std::result::Result<T, MpsseError>;

/// Errors that can occur while driving an MPSSE channel
#[derive(Debug, Error)]
pub enum MpsseError {
    /// Failed to open device
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// Failed to configure device
    #[error("Failed to configure device: {0}")]
    ConfigFailed(String),

    /// USB transfer failed
    #[error("USB transfer failed: {source}")]
    TransferFailed {
        /// Bytes received before the failure
        received: usize,
        #[source]
        source: std::io::Error,
    },

    /// The device stopped answering
    #[error("Timed out after {received} of {expected} bytes")]
    Timeout {
        /// Bytes the command stream asked for
        expected: usize,
        /// Bytes that arrived
        received: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Handle is not configured for the requested protocol
    #[error("Channel is not configured for {0}")]
    NotConfigured(&'static str),

    /// libftdi error
    #[error("libftdi error: {0}")]
    LibFtdi(String),
}

impl MpsseError {
    /// Driver status reported to the channel layer
    pub fn status(&self) -> Status {
        match self {
            MpsseError::OpenFailed(_) => Status::DeviceNotFound,
            MpsseError::ConfigFailed(_) | MpsseError::LibFtdi(_) => Status::OtherError,
            MpsseError::TransferFailed { .. } | MpsseError::Timeout { .. } => Status::IoError,
            MpsseError::InvalidParameter(_) => Status::InvalidParameter,
            MpsseError::NotConfigured(_) => Status::DeviceNotOpened,
        }
    }

    /// Response bytes that arrived before the failure
    pub fn received(&self) -> usize {
        match self {
            MpsseError::TransferFailed { received, .. } | MpsseError::Timeout { received, .. } => {
                *received
            }
            _ => 0,
        }
    }
}

impl From<ftdi::Error> for MpsseError {
    fn from(e: ftdi::Error) -> Self {
        MpsseError::LibFtdi(e.to_string())
    }
}
