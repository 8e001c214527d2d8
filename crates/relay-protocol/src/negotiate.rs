//! Per-channel subsystem negotiation
//!
//! Every request on a channel gets exactly one reply. The reply is positive
//! only for the first `subsystem` request naming the expected subsystem;
//! that request also moves the channel to [`NegotiationState::Negotiated`].

use std::fmt;

use crate::request::{PendingRequest, RequestKind};
use crate::SFTP_SUBSYSTEM;

/// Negotiation state of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No subsystem agreed yet
    AwaitingRequest,
    /// Subsystem agreed; the channel's byte stream belongs to the file server
    Negotiated,
    /// Channel closed before any subsystem was agreed
    Rejected,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::AwaitingRequest => "awaiting-request",
            NegotiationState::Negotiated => "negotiated",
            NegotiationState::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Result of feeding one request to the negotiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// Reply to send for this request
    pub reply: bool,
    /// True exactly once, when this request completed the negotiation
    pub start_service: bool,
}

impl NegotiationOutcome {
    fn refuse() -> Self {
        Self {
            reply: false,
            start_service: false,
        }
    }
}

/// State machine deciding the reply to each channel request
#[derive(Debug, Clone)]
pub struct SubsystemNegotiator {
    /// Subsystem name that completes the negotiation
    expected: String,
    /// Current state
    state: NegotiationState,
}

impl SubsystemNegotiator {
    /// Create a negotiator expecting the given subsystem
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            state: NegotiationState::AwaitingRequest,
        }
    }

    /// Create a negotiator expecting the SFTP subsystem
    pub fn sftp() -> Self {
        Self::new(SFTP_SUBSYSTEM)
    }

    /// Current state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Decide the reply for a request observed on the channel
    pub fn on_request(&mut self, request: &PendingRequest) -> NegotiationOutcome {
        if self.state != NegotiationState::AwaitingRequest {
            tracing::debug!(
                "Refusing '{}' request on a channel in state {}",
                request.kind,
                self.state
            );
            return NegotiationOutcome::refuse();
        }

        if request.kind != RequestKind::Subsystem {
            return NegotiationOutcome::refuse();
        }

        match request.subsystem_name() {
            Ok(name) if name == self.expected => {
                self.state = NegotiationState::Negotiated;
                NegotiationOutcome {
                    reply: true,
                    start_service: true,
                }
            }
            Ok(name) => {
                tracing::debug!("Refusing unsupported subsystem '{}'", name);
                NegotiationOutcome::refuse()
            }
            Err(e) => {
                tracing::debug!("Malformed subsystem request: {}", e);
                NegotiationOutcome::refuse()
            }
        }
    }

    /// Record that the channel closed
    ///
    /// Returns the final state.
    pub fn on_channel_closed(&mut self) -> NegotiationState {
        if self.state == NegotiationState::AwaitingRequest {
            self.state = NegotiationState::Rejected;
        }
        self.state
    }
}

impl Default for SubsystemNegotiator {
    fn default() -> Self {
        Self::sftp()
    }
}
