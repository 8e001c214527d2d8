//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding channel request payloads
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload too short to hold the 4-byte length prefix
    #[error("Payload too short: {actual} bytes, need at least {expected}")]
    PayloadTooShort { expected: usize, actual: usize },

    /// Declared string length disagrees with the bytes that follow it
    #[error("Length mismatch: prefix declares {declared} bytes, payload carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// String bytes are not valid UTF-8
    #[error("Subsystem name is not valid UTF-8")]
    InvalidUtf8,
}
