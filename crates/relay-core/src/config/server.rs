//! Server configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::serde_utils::{duration_secs, option_duration_secs};
use super::{DEFAULT_KEY_PATH, DEFAULT_USERNAME};
use crate::auth::{AuthPolicy, AuthorizedKeys, AuthorizedKeysPolicy, SingleUserPolicy};

/// Which end of a relay a server process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// Source server exposing the file to forward
    Sender,
    /// Destination server accepting uploads
    Receiver,
}

impl ServerRole {
    /// Address bound when neither the config file nor the CLI names one
    pub fn default_bind_address(&self) -> &'static str {
        match self {
            ServerRole::Sender => "0.0.0.0:2221",
            ServerRole::Receiver => "0.0.0.0:2222",
        }
    }

    /// Program name, also used for the default config file name
    pub fn program(&self) -> &'static str {
        match self {
            ServerRole::Sender => "sender",
            ServerRole::Receiver => "receiver",
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Configuration for a relay server (sender or receiver)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the SSH server to (role default when unset)
    pub bind_address: Option<String>,

    /// Path to the private key used as host key
    pub host_key_path: PathBuf,

    /// The one username allowed to log in
    pub username: String,

    /// OpenSSH authorized_keys files; when non-empty, client keys are checked too
    pub authorized_keys: Vec<PathBuf>,

    /// Close connections idle for this long (no limit when unset)
    #[serde(with = "option_duration_secs")]
    pub inactivity_timeout: Option<Duration>,

    /// Delay before answering a rejected authentication attempt
    #[serde(with = "duration_secs")]
    pub auth_rejection_time: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            host_key_path: PathBuf::from(DEFAULT_KEY_PATH),
            username: DEFAULT_USERNAME.to_string(),
            authorized_keys: vec![],
            inactivity_timeout: None,
            auth_rejection_time: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    /// Default configuration with the role's bind address filled in
    pub fn for_role(role: ServerRole) -> Self {
        Self {
            bind_address: Some(role.default_bind_address().to_string()),
            ..Self::default()
        }
    }

    /// Bind address, falling back to the role default
    pub fn bind_address_for(&self, role: ServerRole) -> String {
        self.bind_address
            .clone()
            .unwrap_or_else(|| role.default_bind_address().to_string())
    }

    /// Build the authorization policy described by this configuration
    pub fn auth_policy(&self) -> anyhow::Result<Arc<dyn AuthPolicy>> {
        if self.authorized_keys.is_empty() {
            tracing::warn!(
                "Accepting any public key for user '{}' - configure authorized_keys to check keys",
                self.username
            );
            return Ok(Arc::new(SingleUserPolicy::new(&self.username)));
        }

        let keys = AuthorizedKeys::load_from_files(&self.authorized_keys)?;
        if keys.is_empty() {
            tracing::warn!("No valid authorized keys found - all connections will be rejected");
        } else {
            tracing::info!("Loaded {} authorized keys", keys.len());
        }

        Ok(Arc::new(AuthorizedKeysPolicy::new(&self.username, keys)))
    }
}
