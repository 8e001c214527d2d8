//! Channel requests and their payloads
//!
//! A `subsystem` request carries the subsystem name as an SSH string:
//! - length: 4 bytes (u32, big-endian)
//! - name: `length` bytes

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Size of the SSH string length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Type of a channel request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// `subsystem`
    Subsystem,
    /// `shell`
    Shell,
    /// `exec`
    Exec,
    /// `env`
    Env,
    /// `pty-req`
    PtyReq,
    /// `x11-req`
    X11Req,
    /// `window-change`
    WindowChange,
    /// Any other request type
    Other(String),
}

impl RequestKind {
    /// Classify a request type string as it appears on the wire
    pub fn from_wire(name: &str) -> Self {
        match name {
            "subsystem" => RequestKind::Subsystem,
            "shell" => RequestKind::Shell,
            "exec" => RequestKind::Exec,
            "env" => RequestKind::Env,
            "pty-req" => RequestKind::PtyReq,
            "x11-req" => RequestKind::X11Req,
            "window-change" => RequestKind::WindowChange,
            other => RequestKind::Other(other.to_string()),
        }
    }

    /// Wire name of this request type
    pub fn as_str(&self) -> &str {
        match self {
            RequestKind::Subsystem => "subsystem",
            RequestKind::Shell => "shell",
            RequestKind::Exec => "exec",
            RequestKind::Env => "env",
            RequestKind::PtyReq => "pty-req",
            RequestKind::X11Req => "x11-req",
            RequestKind::WindowChange => "window-change",
            RequestKind::Other(name) => name,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request observed on a channel, awaiting exactly one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Request type
    pub kind: RequestKind,
    /// Type-specific payload
    pub payload: Bytes,
}

impl PendingRequest {
    /// Create a request from its type and raw payload
    pub fn new(kind: RequestKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// A `subsystem` request naming `name`
    pub fn subsystem(name: &str) -> Self {
        Self::new(RequestKind::Subsystem, encode_ssh_string(name))
    }

    /// A request whose payload carries nothing the negotiator inspects
    pub fn bare(kind: RequestKind) -> Self {
        Self::new(kind, Bytes::new())
    }

    /// Decode the subsystem name from the payload
    pub fn subsystem_name(&self) -> Result<&str, ProtocolError> {
        decode_subsystem_name(&self.payload)
    }
}

/// Encode a string in SSH wire format (u32 length followed by the bytes)
pub fn encode_ssh_string(value: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + value.len());
    buf.put_u32(value.len() as u32);
    buf.put_slice(value.as_bytes());
    buf.freeze()
}

/// Decode the subsystem name from a `subsystem` request payload
///
/// The declared length must match the remaining payload exactly; trailing
/// or missing bytes are reported as [`ProtocolError::LengthMismatch`].
pub fn decode_subsystem_name(payload: &[u8]) -> Result<&str, ProtocolError> {
    if payload.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::PayloadTooShort {
            expected: LENGTH_PREFIX_SIZE,
            actual: payload.len(),
        });
    }

    let mut buf = payload;
    let declared = buf.get_u32() as usize;
    if declared != buf.len() {
        return Err(ProtocolError::LengthMismatch {
            declared,
            actual: buf.len(),
        });
    }

    std::str::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)
}
