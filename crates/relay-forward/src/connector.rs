//! Outbound SFTP connector
//!
//! Establishes an authenticated SSH session with one server and starts the
//! SFTP conversation on a session channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession;
use thiserror::Error;

use relay_core::config::ForwarderConfig;
use relay_core::HostKeyVerifier;
use relay_protocol::SFTP_SUBSYSTEM;

/// Connection errors that may require special handling
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Authentication was rejected by the server
    #[error("Authentication rejected by {address}")]
    AuthRejected { address: String },

    /// Host key verification failed
    #[error("Host key of {address} is not trusted")]
    HostKeyRejected { address: String },

    /// The server refused the SFTP subsystem
    #[error("{address} refused the '{subsystem}' subsystem")]
    SubsystemRejected { address: String, subsystem: String },

    /// The connection did not complete in time
    #[error("Connecting to {address} timed out after {after:?}")]
    Timeout { address: String, after: Duration },

    /// Other connection error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Opens SFTP conversations with relay servers
pub struct SftpConnector {
    /// SSH client configuration
    ssh_config: Arc<Config>,
    /// Username presented to every server
    username: String,
    /// Private key for authentication
    key: Arc<KeyPair>,
    /// Decides which host keys are trusted
    verifier: Arc<dyn HostKeyVerifier>,
    /// Upper bound on establishing one conversation
    connect_timeout: Option<Duration>,
}

impl SftpConnector {
    /// Create a connector authenticating with `key`
    pub fn new(
        config: &ForwarderConfig,
        key: Arc<KeyPair>,
        verifier: Arc<dyn HostKeyVerifier>,
    ) -> Self {
        tracing::debug!("Host key verifier: {}", verifier.name());
        Self {
            ssh_config: Arc::new(Config::default()),
            username: config.username.clone(),
            key,
            verifier,
            connect_timeout: config.connect_timeout,
        }
    }

    /// Open an SFTP conversation with the server at `address`
    ///
    /// Makes a single attempt; callers decide what a failure means.
    pub async fn connect(&self, address: &str) -> Result<RemoteFs, ConnectionError> {
        match self.connect_timeout {
            Some(after) => tokio::time::timeout(after, self.establish(address))
                .await
                .map_err(|_| ConnectionError::Timeout {
                    address: address.to_string(),
                    after,
                })?,
            None => self.establish(address).await,
        }
    }

    async fn establish(&self, address: &str) -> Result<RemoteFs, ConnectionError> {
        let handler = ClientHandler {
            address: address.to_string(),
            verifier: Arc::clone(&self.verifier),
        };

        tracing::debug!("Connecting to {}", address);
        let mut session = client::connect(Arc::clone(&self.ssh_config), address, handler)
            .await
            .map_err(|e| match e {
                russh::Error::UnknownKey => ConnectionError::HostKeyRejected {
                    address: address.to_string(),
                },
                other => ConnectionError::Other(anyhow::anyhow!(
                    "Failed to connect to {}: {}",
                    address,
                    other
                )),
            })?;

        tracing::debug!("Authenticating to {} as user '{}'", address, self.username);
        let authenticated = session
            .authenticate_publickey(&self.username, Arc::clone(&self.key))
            .await
            .map_err(|e| anyhow::anyhow!("Authentication error: {}", e))?;

        if !authenticated {
            return Err(ConnectionError::AuthRejected {
                address: address.to_string(),
            });
        }

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open session channel: {}", e))?;

        channel
            .request_subsystem(true, SFTP_SUBSYSTEM)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to request subsystem: {}", e))?;

        let accepted = loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => break true,
                Some(ChannelMsg::Failure) | None => break false,
                Some(other) => {
                    tracing::trace!("Ignoring {:?} while awaiting subsystem reply", other);
                }
            }
        };

        if !accepted {
            return Err(ConnectionError::SubsystemRejected {
                address: address.to_string(),
                subsystem: SFTP_SUBSYSTEM.to_string(),
            });
        }

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| anyhow::anyhow!("SFTP handshake with {} failed: {}", address, e))?;

        tracing::info!("SFTP session established with {}", address);

        Ok(RemoteFs {
            address: address.to_string(),
            session,
            sftp,
        })
    }
}

/// An SFTP conversation with one server
pub struct RemoteFs {
    /// Server address, for diagnostics
    address: String,
    /// SSH session handle
    session: Handle<ClientHandler>,
    /// SFTP client running on the negotiated channel
    sftp: SftpSession,
}

impl RemoteFs {
    /// Address of the server
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Open an existing remote file for reading
    pub async fn open_read(&self, path: &str) -> Result<File, SftpError> {
        self.sftp.open(path).await
    }

    /// Create or truncate a remote file for writing
    pub async fn create(&self, path: &str) -> Result<File, SftpError> {
        self.sftp.create(path).await
    }

    /// End the SFTP conversation and disconnect
    pub async fn close(self) -> anyhow::Result<()> {
        drop(self.sftp);
        self.session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        tracing::debug!("Disconnected from {}", self.address);
        Ok(())
    }
}

/// SSH client handler delegating host key trust to a verifier
pub struct ClientHandler {
    /// Server address the key is checked for
    address: String,
    /// Configured verifier
    verifier: Arc<dyn HostKeyVerifier>,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self.verifier.verify(&self.address, server_public_key))
    }
}
