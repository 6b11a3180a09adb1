//! Error types for the cryptdev protocol

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Command framing and field errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("command too short: {len} bytes")]
    TooShort { len: usize },

    #[error("bad framing: expected ':' at index 1, found {found:#04x}")]
    BadFraming { found: u8 },

    #[error("unknown operation: {0:#04x}")]
    UnknownOperation(u8),

    #[error("invalid shift: {0:?} (expected 0-25)")]
    InvalidShift(String),

    #[error("empty payload")]
    EmptyPayload,
}

/// Device-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no device attached")]
    NoDevice,

    #[error("a device is already attached")]
    AlreadyAttached,

    #[error("could not allocate {capacity} byte session buffer")]
    AllocationFailed { capacity: usize },

    #[error("command too large: {size} bytes (max {max})")]
    CommandTooLarge { size: usize, max: usize },

    #[error("unknown handle: {0}")]
    BadHandle(u64),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O boundary error: {0}")]
    IoBoundary(String),
}

impl DeviceError {
    /// Only a failed allocation at attach is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceError::AllocationFailed { .. })
    }
}

/// Stable error codes, reported through the device file as errno values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // General (0-99)
    Ok = 0,
    Unknown = 1,

    // Command errors (100-199)
    TooShort = 100,
    BadFraming = 101,
    UnknownOperation = 102,
    InvalidShift = 103,
    EmptyPayload = 104,
    CommandTooLarge = 105,

    // Device errors (200-299)
    NoDevice = 200,
    AlreadyAttached = 201,
    AllocationFailed = 202,
    BadHandle = 203,

    // I/O errors (300-399)
    IoError = 300,
}

impl From<&ParseError> for ErrorCode {
    fn from(e: &ParseError) -> Self {
        match e {
            ParseError::TooShort { .. } => ErrorCode::TooShort,
            ParseError::BadFraming { .. } => ErrorCode::BadFraming,
            ParseError::UnknownOperation(_) => ErrorCode::UnknownOperation,
            ParseError::InvalidShift(_) => ErrorCode::InvalidShift,
            ParseError::EmptyPayload => ErrorCode::EmptyPayload,
        }
    }
}

impl From<&DeviceError> for ErrorCode {
    fn from(e: &DeviceError) -> Self {
        match e {
            DeviceError::NoDevice => ErrorCode::NoDevice,
            DeviceError::AlreadyAttached => ErrorCode::AlreadyAttached,
            DeviceError::AllocationFailed { .. } => ErrorCode::AllocationFailed,
            DeviceError::CommandTooLarge { .. } => ErrorCode::CommandTooLarge,
            DeviceError::BadHandle(_) => ErrorCode::BadHandle,
            DeviceError::Parse(p) => ErrorCode::from(p),
            DeviceError::IoBoundary(_) => ErrorCode::IoError,
        }
    }
}

/// Map error code to libc errno
impl ErrorCode {
    pub fn to_errno(self) -> i32 {
        match self {
            ErrorCode::Ok => 0,
            ErrorCode::TooShort
            | ErrorCode::BadFraming
            | ErrorCode::UnknownOperation
            | ErrorCode::InvalidShift
            | ErrorCode::EmptyPayload
            | ErrorCode::CommandTooLarge => libc::EINVAL,
            ErrorCode::NoDevice => libc::ENODEV,
            ErrorCode::AlreadyAttached => libc::EBUSY,
            ErrorCode::AllocationFailed => libc::ENOMEM,
            ErrorCode::BadHandle => libc::EBADF,
            _ => libc::EIO,
        }
    }
}

impl DeviceError {
    pub fn to_errno(&self) -> i32 {
        ErrorCode::from(self).to_errno()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_einval() {
        let errors = [
            ParseError::TooShort { len: 1 },
            ParseError::BadFraming { found: b'X' },
            ParseError::UnknownOperation(b'Q'),
            ParseError::InvalidShift("26".into()),
            ParseError::EmptyPayload,
        ];
        for e in errors {
            assert_eq!(DeviceError::from(e).to_errno(), libc::EINVAL);
        }
    }

    #[test]
    fn test_device_errno() {
        assert_eq!(DeviceError::NoDevice.to_errno(), libc::ENODEV);
        assert_eq!(DeviceError::AlreadyAttached.to_errno(), libc::EBUSY);
        assert_eq!(
            DeviceError::AllocationFailed { capacity: 1 }.to_errno(),
            libc::ENOMEM
        );
        assert_eq!(DeviceError::BadHandle(9).to_errno(), libc::EBADF);
        assert_eq!(DeviceError::IoBoundary("x".into()).to_errno(), libc::EIO);
    }

    #[test]
    fn test_only_allocation_is_retryable() {
        assert!(DeviceError::AllocationFailed { capacity: 64 }.is_retryable());
        assert!(!DeviceError::NoDevice.is_retryable());
        assert!(!DeviceError::Parse(ParseError::EmptyPayload).is_retryable());
    }

    #[test]
    fn test_display() {
        let e = DeviceError::CommandTooLarge { size: 70000, max: 65536 };
        assert_eq!(e.to_string(), "command too large: 70000 bytes (max 65536)");
        let e = DeviceError::from(ParseError::BadFraming { found: b'X' });
        assert_eq!(e.to_string(), "bad framing: expected ':' at index 1, found 0x58");
    }
}
