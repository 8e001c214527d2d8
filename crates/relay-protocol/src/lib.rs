//! relay-protocol: Channel and subsystem negotiation model
//!
//! This crate describes the parts of an SSH connection that the relay
//! servers make decisions about: which channel offers are accepted, how
//! channel requests are represented, and the per-channel state machine
//! that decides when the SFTP subsystem has been negotiated.

pub mod channel;
pub mod error;
pub mod negotiate;
pub mod request;

pub use channel::{ChannelKind, OfferDecision, RejectReason};
pub use error::ProtocolError;
pub use negotiate::{NegotiationOutcome, NegotiationState, SubsystemNegotiator};
pub use request::{decode_subsystem_name, encode_ssh_string, PendingRequest, RequestKind};

/// Name of the file-transfer subsystem served on negotiated channels
pub const SFTP_SUBSYSTEM: &str = "sftp";
