//! SSH connection handler
//!
//! Implements the russh server handler for one client connection: public
//! key authentication through the configured policy, channel offer
//! filtering, and subsystem negotiation on each `session` channel.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use russh::server::{Auth, Handler, Msg, Session};
use russh::{Channel, ChannelId};
use russh_keys::key::{KeyPair, PublicKey};

use relay_core::config::ServerConfig;
use relay_core::{AuthDecision, AuthPolicy};
use relay_protocol::{ChannelKind, OfferDecision, PendingRequest, RequestKind};

use crate::session::{ChannelTable, RequestVerdict};
use crate::sftp::FileServer;

/// Handler for a single SSH client connection
pub struct ConnectionHandler {
    /// Peer address of the connecting client
    peer_addr: SocketAddr,
    /// Authorization policy
    policy: Arc<dyn AuthPolicy>,
    /// Directory relative SFTP paths resolve against
    file_root: Arc<PathBuf>,
    /// Authenticated username
    user: Option<String>,
    /// Accepted channels awaiting or past negotiation
    channels: ChannelTable<ChannelId, Channel<Msg>>,
}

impl ConnectionHandler {
    /// Create a handler for a freshly accepted connection
    pub fn new(peer_addr: SocketAddr, policy: Arc<dyn AuthPolicy>, file_root: Arc<PathBuf>) -> Self {
        Self {
            peer_addr,
            policy,
            file_root,
            user: None,
            channels: ChannelTable::new(),
        }
    }

    /// Answer a channel request and start the file server once negotiated
    async fn settle_request(
        &mut self,
        channel: ChannelId,
        request: PendingRequest,
        session: &mut Session,
    ) {
        tracing::debug!(
            "'{}' request on channel {:?} from {}",
            request.kind,
            channel,
            self.peer_addr
        );

        match self.channels.on_request(channel, &request) {
            RequestVerdict::StartService(accepted) => {
                session.channel_success(channel);
                self.start_file_service(accepted).await;
            }
            RequestVerdict::Refuse => {
                session.channel_failure(channel);
            }
        }
    }

    /// Serve SFTP on a negotiated channel
    async fn start_file_service(&self, channel: Channel<Msg>) {
        let label = format!("{}/{:?}", self.peer_addr, channel.id());
        tracing::info!("SFTP subsystem started for {}", label);

        let server = FileServer::new(Arc::clone(&self.file_root), label);
        russh_sftp::server::run(channel.into_stream(), server).await;
    }

    /// Accept interactive sessions; log and refuse every other channel type
    fn decide_offer(&self, kind: ChannelKind) -> bool {
        match kind.decide() {
            OfferDecision::Accept => true,
            OfferDecision::Reject(reason) => {
                tracing::info!(
                    "Rejecting '{}' channel from {}: {}",
                    kind,
                    self.peer_addr,
                    reason
                );
                false
            }
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        tracing::debug!(
            "Session with {} ended ({} channels still registered)",
            self.peer_addr,
            self.channels.len()
        );
    }
}

#[async_trait]
impl Handler for ConnectionHandler {
    type Error = anyhow::Error;

    /// Handle public key authentication
    async fn auth_publickey(
        &mut self,
        user: &str,
        public_key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        let fingerprint = public_key.fingerprint();

        match self.policy.authorize(user, public_key) {
            AuthDecision::Accept => {
                tracing::info!(
                    "Authenticated '{}' from {} ({} policy), key fingerprint: {}",
                    user,
                    self.peer_addr,
                    self.policy.name(),
                    fingerprint
                );
                self.user = Some(user.to_string());
                Ok(Auth::Accept)
            }
            AuthDecision::Reject => {
                tracing::warn!(
                    "Authentication REJECTED for '{}' from {}, key fingerprint: {}",
                    user,
                    self.peer_addr,
                    fingerprint
                );
                Ok(Auth::Reject {
                    proceed_with_methods: None,
                })
            }
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let accepted = self.decide_offer(ChannelKind::Session);
        if accepted {
            tracing::debug!("Session channel {:?} opened by {}", channel.id(), self.peer_addr);
            self.channels.open(channel.id(), channel);
        }
        Ok(accepted)
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        _host_to_connect: &str,
        _port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(self.decide_offer(ChannelKind::DirectTcpip))
    }

    async fn channel_open_forwarded_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        _host_to_connect: &str,
        _port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(self.decide_offer(ChannelKind::ForwardedTcpip))
    }

    async fn channel_open_x11(
        &mut self,
        _channel: Channel<Msg>,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        Ok(self.decide_offer(ChannelKind::X11))
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.settle_request(channel, PendingRequest::subsystem(name), session)
            .await;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.settle_request(channel, PendingRequest::bare(RequestKind::Shell), session)
            .await;
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let request = PendingRequest::new(RequestKind::Exec, Bytes::copy_from_slice(data));
        self.settle_request(channel, request, session).await;
        Ok(())
    }

    async fn env_request(
        &mut self,
        channel: ChannelId,
        _variable_name: &str,
        _variable_value: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.settle_request(channel, PendingRequest::bare(RequestKind::Env), session)
            .await;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(russh::Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.settle_request(channel, PendingRequest::bare(RequestKind::PtyReq), session)
            .await;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn x11_request(
        &mut self,
        channel: ChannelId,
        _single_connection: bool,
        _x11_auth_protocol: &str,
        _x11_auth_cookie: &str,
        _x11_screen_number: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.settle_request(channel, PendingRequest::bare(RequestKind::X11Req), session)
            .await;
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let request = PendingRequest::bare(RequestKind::WindowChange);
        self.settle_request(channel, request, session).await;
        Ok(())
    }

    /// Out-of-band port forwarding requests are drained and refused
    async fn tcpip_forward(
        &mut self,
        address: &str,
        port: &mut u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "Discarding tcpip-forward request for {}:{} from {}",
            address,
            port,
            self.peer_addr
        );
        Ok(false)
    }

    async fn cancel_tcpip_forward(
        &mut self,
        address: &str,
        port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "Discarding cancel-tcpip-forward request for {}:{} from {}",
            address,
            port,
            self.peer_addr
        );
        Ok(false)
    }

    /// Handle channel EOF
    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!("Channel EOF: {:?}", channel);
        Ok(())
    }

    /// Handle channel close
    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(state) = self.channels.close(channel) {
            tracing::debug!("Channel {:?} closed in state {}", channel, state);
        }
        Ok(())
    }
}

/// russh configuration shared by every connection of one server
#[derive(Clone)]
pub struct TransportConfig {
    /// russh server configuration
    pub ssh_config: Arc<russh::server::Config>,
}

impl TransportConfig {
    /// Create a transport configuration with the given host key
    pub fn new(host_key: KeyPair, config: &ServerConfig) -> Self {
        let mut ssh_config = russh::server::Config::default();
        ssh_config.keys.push(host_key);
        ssh_config.auth_rejection_time = config.auth_rejection_time;
        ssh_config.auth_rejection_time_initial = Some(std::time::Duration::from_secs(0));
        ssh_config.inactivity_timeout = config.inactivity_timeout;

        Self {
            ssh_config: Arc::new(ssh_config),
        }
    }
}
