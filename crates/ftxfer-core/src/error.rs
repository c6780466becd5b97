//! Error types for ftxfer-core
//!
//! Three layers of failure are distinguished:
//!
//! - [`Status`]: the closed status taxonomy reported by the native driver
//!   for one call. Backends convert their raw codes with
//!   [`Status::from_code`]; nothing above the transport sees a number.
//! - [`TransportError`]: one segment failed, with the byte count the driver
//!   reported before the failure.
//! - [`TransferError`]: a whole chunked transfer stopped early, with the
//!   exact number of bytes that made it across.

use crate::channel::{ChannelState, Mode};
use core::fmt;

/// Native driver status
///
/// Mirrors the D2XX `FT_STATUS` codes. `Ok` is an explicit variant so a
/// transport can hand back a status value without wrapping it in an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Call succeeded
    Ok,
    /// Handle is not valid
    InvalidHandle,
    /// No matching device
    DeviceNotFound,
    /// Device was never opened, or was closed
    DeviceNotOpened,
    /// USB I/O error
    IoError,
    /// Out of driver resources
    InsufficientResources,
    /// A parameter was rejected
    InvalidParameter,
    /// Baud rate not supported
    InvalidBaudRate,
    /// Device not opened for erase
    DeviceNotOpenedForErase,
    /// Device not opened for write
    DeviceNotOpenedForWrite,
    /// Write to the device failed
    FailedToWriteDevice,
    /// EEPROM read failed
    EepromReadFailed,
    /// EEPROM write failed
    EepromWriteFailed,
    /// EEPROM erase failed
    EepromEraseFailed,
    /// No EEPROM fitted
    EepromNotPresent,
    /// EEPROM is blank
    EepromNotProgrammed,
    /// Invalid arguments
    InvalidArgs,
    /// Operation not supported
    NotSupported,
    /// Any other failure, including codes outside the known table
    OtherError,
    /// Device list has not been built yet
    DeviceListNotReady,
}

impl Status {
    /// Convert a raw `FT_STATUS` code
    ///
    /// Unknown codes collapse into [`Status::OtherError`].
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Status::Ok,
            1 => Status::InvalidHandle,
            2 => Status::DeviceNotFound,
            3 => Status::DeviceNotOpened,
            4 => Status::IoError,
            5 => Status::InsufficientResources,
            6 => Status::InvalidParameter,
            7 => Status::InvalidBaudRate,
            8 => Status::DeviceNotOpenedForErase,
            9 => Status::DeviceNotOpenedForWrite,
            10 => Status::FailedToWriteDevice,
            11 => Status::EepromReadFailed,
            12 => Status::EepromWriteFailed,
            13 => Status::EepromEraseFailed,
            14 => Status::EepromNotPresent,
            15 => Status::EepromNotProgrammed,
            16 => Status::InvalidArgs,
            17 => Status::NotSupported,
            19 => Status::DeviceListNotReady,
            _ => Status::OtherError,
        }
    }

    /// Whether this status reports success
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    /// Human-readable description
    pub fn message(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::InvalidHandle => "invalid handle",
            Status::DeviceNotFound => "device not found",
            Status::DeviceNotOpened => "device not opened",
            Status::IoError => "IO error",
            Status::InsufficientResources => "insufficient resources",
            Status::InvalidParameter => "invalid parameter",
            Status::InvalidBaudRate => "invalid baud rate",
            Status::DeviceNotOpenedForErase => "device not opened for erase",
            Status::DeviceNotOpenedForWrite => "device not opened for write",
            Status::FailedToWriteDevice => "failed to write device",
            Status::EepromReadFailed => "EEPROM read failed",
            Status::EepromWriteFailed => "EEPROM write failed",
            Status::EepromEraseFailed => "EEPROM erase failed",
            Status::EepromNotPresent => "EEPROM not present",
            Status::EepromNotProgrammed => "EEPROM not programmed",
            Status::InvalidArgs => "invalid args",
            Status::NotSupported => "not supported",
            Status::OtherError => "other error",
            Status::DeviceListNotReady => "device list not ready",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A single transport call failed
///
/// `transferred` is the number of bytes of the requested segment that the
/// driver reports as moved before it gave up (possibly zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{status} after {transferred} bytes")]
pub struct TransportError {
    /// Failure reported by the driver
    pub status: Status,
    /// Bytes of the segment transferred before the failure
    pub transferred: usize,
}

impl TransportError {
    /// Create a transport error
    pub fn new(status: Status, transferred: usize) -> Self {
        Self {
            status,
            transferred,
        }
    }
}

/// A chunked transfer did not complete
///
/// Every variant knows how many bytes of the logical transfer actually
/// crossed the link; see [`TransferError::transferred`]. Bus framing is not
/// repaired after a failure: chip-select may still be asserted and an I²C
/// transaction may still be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The transport reported a failure
    #[error("segment {segment} failed after {transferred} bytes: {status}")]
    Failed {
        /// Index of the failing segment
        segment: usize,
        /// Bytes transferred in total, including the failing segment's partial count
        transferred: usize,
        /// Status reported for the failing segment
        status: Status,
    },

    /// The transport succeeded but moved fewer bytes than requested
    #[error("short transfer in segment {segment}: {transferred} of {requested} bytes")]
    ShortCount {
        /// Index of the short segment
        segment: usize,
        /// Bytes transferred in total
        transferred: usize,
        /// Bytes requested for the whole transfer
        requested: usize,
    },

    /// I²C slave address does not fit in 7 bits
    #[error("invalid I2C address 0x{0:02X} (must be 0x00-0x7F)")]
    InvalidAddress(u8),

    /// Full-duplex buffers differ in length
    #[error("send buffer is {send} bytes but receive buffer is {recv} bytes")]
    LengthMismatch {
        /// Length of the outgoing buffer
        send: usize,
        /// Length of the incoming buffer
        recv: usize,
    },
}

impl TransferError {
    /// Bytes that were transferred before the transfer stopped
    pub fn transferred(&self) -> usize {
        match self {
            TransferError::Failed { transferred, .. }
            | TransferError::ShortCount { transferred, .. } => *transferred,
            TransferError::InvalidAddress(_) | TransferError::LengthMismatch { .. } => 0,
        }
    }

    /// Driver status behind this error, if any
    pub fn status(&self) -> Option<Status> {
        match self {
            TransferError::Failed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Channel-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bus was requested in a mode the channel is not open in
    #[error("channel is {state}, expected open in {expected} mode")]
    NotOpen {
        /// Mode the caller asked for
        expected: Mode,
        /// State the channel is actually in
        state: ChannelState,
    },

    /// Opening or configuring the device failed; the channel is closed
    #[error("failed to initialize {mode} channel: {status}")]
    InitFailed {
        /// Mode that was being initialized
        mode: Mode,
        /// Status reported by the driver
        status: Status,
    },

    /// Reconfiguring an open channel failed; the channel stays open
    #[error("failed to change {mode} channel settings: {status}")]
    ChangeFailed {
        /// Mode the channel is open in
        mode: Mode,
        /// Status reported by the driver
        status: Status,
    },

    /// Releasing the device handle failed; the channel is closed regardless
    #[error("failed to release channel handle: {0}")]
    ReleaseFailed(Status),

    /// A transfer stopped early
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Another thread panicked while holding the device lock
    #[error("device lock poisoned")]
    LockPoisoned,
}

/// Result type alias using the channel [`Error`]
pub type Result<T> = core::result::Result<T, Error>;
