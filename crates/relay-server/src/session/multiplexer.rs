//! Channel multiplexing within one SSH session
//!
//! The table owns every accepted channel until its subsystem is negotiated,
//! at which point the channel is handed out to be served. Channels are
//! independent: a refused request or a closed channel never touches the
//! state of its siblings.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use relay_protocol::{NegotiationState, PendingRequest, SubsystemNegotiator};

/// What to do with a channel request
#[derive(Debug)]
pub enum RequestVerdict<C> {
    /// Reply with failure
    Refuse,
    /// Reply with success and serve the channel
    StartService(C),
}

impl<C> RequestVerdict<C> {
    /// Reply owed to the requester
    pub fn reply(&self) -> bool {
        matches!(self, RequestVerdict::StartService(_))
    }
}

struct ChannelSlot<C> {
    /// Present until handed to the file server
    channel: Option<C>,
    negotiator: SubsystemNegotiator,
}

/// Accepted channels of one session, keyed by channel id
pub struct ChannelTable<K, C> {
    channels: HashMap<K, ChannelSlot<C>>,
}

impl<K, C> ChannelTable<K, C>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Register a freshly accepted channel
    pub fn open(&mut self, id: K, channel: C) {
        tracing::debug!("Channel {:?} accepted, awaiting subsystem request", id);
        self.channels.insert(
            id,
            ChannelSlot {
                channel: Some(channel),
                negotiator: SubsystemNegotiator::sftp(),
            },
        );
    }

    /// Decide the reply to a request on channel `id`
    pub fn on_request(&mut self, id: K, request: &PendingRequest) -> RequestVerdict<C> {
        let Some(slot) = self.channels.get_mut(&id) else {
            tracing::debug!("'{}' request on unknown channel {:?}", request.kind, id);
            return RequestVerdict::Refuse;
        };

        let outcome = slot.negotiator.on_request(request);
        if !outcome.start_service {
            return RequestVerdict::Refuse;
        }

        match slot.channel.take() {
            Some(channel) => RequestVerdict::StartService(channel),
            None => RequestVerdict::Refuse,
        }
    }

    /// Negotiation state of channel `id`
    pub fn state(&self, id: K) -> Option<NegotiationState> {
        self.channels.get(&id).map(|slot| slot.negotiator.state())
    }

    /// Forget channel `id`, returning its final negotiation state
    pub fn close(&mut self, id: K) -> Option<NegotiationState> {
        self.channels
            .remove(&id)
            .map(|mut slot| slot.negotiator.on_channel_closed())
    }

    /// Number of open channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if no channel is open
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl<K, C> Default for ChannelTable<K, C>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::RequestKind;

    type Table = ChannelTable<u32, &'static str>;

    #[test]
    fn test_sftp_request_hands_out_channel() {
        let mut table = Table::new();
        table.open(1, "chan-1");

        let verdict = table.on_request(1, &PendingRequest::subsystem("sftp"));
        assert!(verdict.reply());
        assert!(matches!(verdict, RequestVerdict::StartService("chan-1")));
        assert_eq!(table.state(1), Some(NegotiationState::Negotiated));
    }

    #[test]
    fn test_every_request_is_answered_once() {
        let mut table = Table::new();
        table.open(1, "chan-1");

        let requests = [
            PendingRequest::bare(RequestKind::PtyReq),
            PendingRequest::bare(RequestKind::Env),
            PendingRequest::subsystem("shell"),
            PendingRequest::subsystem("sftp"),
            PendingRequest::subsystem("sftp"),
            PendingRequest::bare(RequestKind::Shell),
        ];
        let replies: Vec<bool> = requests
            .iter()
            .map(|r| table.on_request(1, r).reply())
            .collect();

        assert_eq!(replies, vec![false, false, false, true, false, false]);
    }

    #[test]
    fn test_shell_subsystem_leaves_channel_waiting() {
        let mut table = Table::new();
        table.open(7, "chan-7");

        assert!(!table.on_request(7, &PendingRequest::subsystem("shell")).reply());
        assert_eq!(table.state(7), Some(NegotiationState::AwaitingRequest));
    }

    #[test]
    fn test_unknown_channel_is_refused() {
        let mut table = Table::new();
        assert!(!table.on_request(3, &PendingRequest::subsystem("sftp")).reply());
    }

    #[test]
    fn test_channels_are_independent() {
        let mut table = Table::new();
        table.open(1, "chan-1");
        table.open(2, "chan-2");

        assert!(!table.on_request(1, &PendingRequest::subsystem("shell")).reply());
        assert!(table.on_request(2, &PendingRequest::subsystem("sftp")).reply());

        assert_eq!(table.close(1), Some(NegotiationState::Rejected));
        assert_eq!(table.state(2), Some(NegotiationState::Negotiated));
        assert_eq!(table.len(), 1);

        // A closed channel no longer answers positively
        assert!(!table.on_request(1, &PendingRequest::subsystem("sftp")).reply());
    }

    #[test]
    fn test_close_after_service() {
        let mut table = Table::new();
        table.open(1, "chan-1");
        table.on_request(1, &PendingRequest::subsystem("sftp"));

        assert_eq!(table.close(1), Some(NegotiationState::Negotiated));
        assert!(table.is_empty());
        assert_eq!(table.close(1), None);
    }
}
