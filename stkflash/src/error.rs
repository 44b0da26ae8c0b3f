//! Error types for stkflash.

use std::io;
use thiserror::Error;

/// Result type for stkflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for stkflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Malformed Intel HEX record.
    #[error("Invalid HEX on line {line}: {reason}")]
    InvalidHex {
        /// 1-based line number of the offending record.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Record checksum mismatch.
    #[error("Invalid checksum on line {line}: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// 1-based line number of the offending record.
        line: usize,
        /// Checksum byte stored in the record.
        expected: u8,
        /// Checksum computed over the record fields.
        actual: u8,
    },

    /// Input ended without an End Of File record.
    #[error("Invalid HEX: missing EOF record")]
    MissingEof,

    /// Bootloader never answered the sync handshake.
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// Unexpected bootloader response or out-of-order session operation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation cancelled at a page boundary.
    #[error("Operation cancelled")]
    Cancelled,

    /// Unsupported image or operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse failure category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed, checksum-failing, or unprogrammable HEX input.
    Format,
    /// Serial channel could not be opened or accessed.
    Channel,
    /// Handshake exhausted at every baud rate tried.
    Sync,
    /// Unexpected response entering or leaving programming mode.
    Protocol,
    /// Cancelled by the caller.
    Cancelled,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHex { .. }
            | Self::ChecksumMismatch { .. }
            | Self::MissingEof
            | Self::Unsupported(_) => ErrorKind::Format,
            #[cfg(feature = "native")]
            Self::Serial(_) => ErrorKind::Channel,
            Self::Io(_) | Self::Config(_) => ErrorKind::Channel,
            Self::SyncFailed(_) => ErrorKind::Sync,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn invalid_hex(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidHex {
            line,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(Error::MissingEof.kind(), ErrorKind::Format);
        assert_eq!(
            Error::ChecksumMismatch {
                line: 3,
                expected: 0x01,
                actual: 0x02
            }
            .kind(),
            ErrorKind::Format
        );
        assert_eq!(
            Error::Io(io::Error::other("gone")).kind(),
            ErrorKind::Channel
        );
        assert_eq!(Error::SyncFailed("x".into()).kind(), ErrorKind::Sync);
        assert_eq!(Error::Protocol("x".into()).kind(), ErrorKind::Protocol);
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_error_messages_carry_line_numbers() {
        let err = Error::invalid_hex(7, "bad line start");
        assert_eq!(err.to_string(), "Invalid HEX on line 7: bad line start");

        let err = Error::ChecksumMismatch {
            line: 2,
            expected: 0x1c,
            actual: 0x1d,
        };
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("0x1c"));
    }
}
