//! Channel offer classification
//!
//! Only interactive `session` channels carry the SFTP subsystem. Every
//! other channel type is turned away without affecting the connection.

use std::fmt;

/// Channel type named in an SSH `CHANNEL_OPEN` offer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Interactive session (`session`)
    Session,
    /// Client-initiated TCP forwarding (`direct-tcpip`)
    DirectTcpip,
    /// Server-initiated TCP forwarding (`forwarded-tcpip`)
    ForwardedTcpip,
    /// X11 forwarding (`x11`)
    X11,
    /// Any other channel type
    Other(String),
}

impl ChannelKind {
    /// Classify a channel type string as it appears on the wire
    pub fn from_wire(name: &str) -> Self {
        match name {
            "session" => ChannelKind::Session,
            "direct-tcpip" => ChannelKind::DirectTcpip,
            "forwarded-tcpip" => ChannelKind::ForwardedTcpip,
            "x11" => ChannelKind::X11,
            other => ChannelKind::Other(other.to_string()),
        }
    }

    /// Wire name of this channel type
    pub fn as_str(&self) -> &str {
        match self {
            ChannelKind::Session => "session",
            ChannelKind::DirectTcpip => "direct-tcpip",
            ChannelKind::ForwardedTcpip => "forwarded-tcpip",
            ChannelKind::X11 => "x11",
            ChannelKind::Other(name) => name,
        }
    }

    /// Decide whether an offer of this type is accepted
    pub fn decide(&self) -> OfferDecision {
        match self {
            ChannelKind::Session => OfferDecision::Accept,
            _ => OfferDecision::Reject(RejectReason::UnknownChannelType),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a channel offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferDecision {
    /// Open the channel
    Accept,
    /// Refuse the channel with the given reason
    Reject(RejectReason),
}

impl OfferDecision {
    /// Whether the offer is accepted
    pub fn is_accept(&self) -> bool {
        matches!(self, OfferDecision::Accept)
    }
}

/// Reason attached to a refused channel offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The channel type is not served here (`SSH_OPEN_UNKNOWN_CHANNEL_TYPE`)
    UnknownChannelType,
}

impl RejectReason {
    /// Numeric reason code from RFC 4254 section 5.1
    pub fn code(&self) -> u32 {
        match self {
            RejectReason::UnknownChannelType => 3,
        }
    }

    /// Human-readable description sent alongside the code
    pub fn description(&self) -> &'static str {
        match self {
            RejectReason::UnknownChannelType => "unknown channel type",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_is_accepted() {
        assert_eq!(ChannelKind::from_wire("session").decide(), OfferDecision::Accept);
    }

    #[test]
    fn test_direct_tcpip_is_rejected_as_unknown() {
        let kind = ChannelKind::from_wire("direct-tcpip");
        assert_eq!(kind, ChannelKind::DirectTcpip);
        assert_eq!(
            kind.decide(),
            OfferDecision::Reject(RejectReason::UnknownChannelType)
        );
    }

    #[test]
    fn test_every_non_session_kind_is_rejected() {
        for name in ["direct-tcpip", "forwarded-tcpip", "x11", "auth-agent@openssh.com", ""] {
            let decision = ChannelKind::from_wire(name).decide();
            assert!(!decision.is_accept(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn test_wire_name_roundtrip() {
        let kind = ChannelKind::from_wire("tun@openssh.com");
        assert_eq!(kind.as_str(), "tun@openssh.com");
        assert_eq!(format!("{}", ChannelKind::Session), "session");
    }

    #[test]
    fn test_reject_reason() {
        let reason = RejectReason::UnknownChannelType;
        assert_eq!(reason.code(), 3);
        assert_eq!(reason.to_string(), "unknown channel type");
    }
}
