//! Forwarder configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::serde_utils::option_duration_secs;
use super::{DEFAULT_KEY_PATH, DEFAULT_USERNAME};
use crate::trust::{HostKeyVerifier, InsecureAcceptAnyHostKey, PinnedHostKeys};

/// Configuration for the forwarding client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Address of the source (sender) server
    pub source_address: String,

    /// Address of the destination (receiver) server
    pub destination_address: String,

    /// Username for SSH authentication on both servers
    pub username: String,

    /// Path to the private key for authentication
    pub private_key_path: PathBuf,

    /// Give up connecting after this long (no limit when unset)
    #[serde(with = "option_duration_secs")]
    pub connect_timeout: Option<Duration>,

    /// Host key fingerprints trusted for either server
    pub trusted_host_keys: Vec<String>,

    /// Accept any host key without verification. For testing only.
    pub insecure_accept_any_host_key: bool,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            source_address: "localhost:2221".to_string(),
            destination_address: "localhost:2222".to_string(),
            username: DEFAULT_USERNAME.to_string(),
            private_key_path: PathBuf::from(DEFAULT_KEY_PATH),
            connect_timeout: None,
            trusted_host_keys: vec![],
            insecure_accept_any_host_key: false,
        }
    }
}

impl ForwarderConfig {
    /// Build the host key verifier described by this configuration
    pub fn host_key_verifier(&self) -> Arc<dyn HostKeyVerifier> {
        if self.insecure_accept_any_host_key {
            tracing::warn!("Host key verification disabled - for testing only");
            return Arc::new(InsecureAcceptAnyHostKey);
        }

        if self.trusted_host_keys.is_empty() {
            tracing::warn!("No trusted host keys configured - all servers will be rejected");
        }

        Arc::new(PinnedHostKeys::new(self.trusted_host_keys.iter().cloned()))
    }
}
