//! Host key verification for the forwarding client

use std::collections::HashSet;

use russh_keys::key::PublicKey;

/// Decides whether a server's host key is trusted
pub trait HostKeyVerifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Check the host key presented by `host`
    fn verify(&self, host: &str, key: &PublicKey) -> bool;
}

/// Trusts only host keys whose fingerprint was configured ahead of time
#[derive(Debug, Clone, Default)]
pub struct PinnedHostKeys {
    fingerprints: HashSet<String>,
}

impl PinnedHostKeys {
    /// Create a verifier from fingerprints, with or without the `SHA256:` prefix
    pub fn new<I, S>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fingerprints: fingerprints
                .into_iter()
                .map(|fp| normalize_fingerprint(fp.as_ref()).to_string())
                .collect(),
        }
    }
}

impl HostKeyVerifier for PinnedHostKeys {
    fn name(&self) -> &'static str {
        "pinned"
    }

    fn verify(&self, host: &str, key: &PublicKey) -> bool {
        let fingerprint = key.fingerprint();
        let trusted = self
            .fingerprints
            .contains(normalize_fingerprint(&fingerprint));

        if trusted {
            tracing::debug!("Host key for {} verified: {}", host, fingerprint);
        } else {
            tracing::warn!("Untrusted host key for {}: SHA256:{}", host, fingerprint);
        }
        trusted
    }
}

/// Trusts every host key. For testing only.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureAcceptAnyHostKey;

impl HostKeyVerifier for InsecureAcceptAnyHostKey {
    fn name(&self) -> &'static str {
        "insecure-accept-any"
    }

    fn verify(&self, host: &str, key: &PublicKey) -> bool {
        tracing::warn!(
            "Accepting unverified host key for {}: {}",
            host,
            key.fingerprint()
        );
        true
    }
}

fn normalize_fingerprint(fingerprint: &str) -> &str {
    let trimmed = fingerprint.trim();
    trimmed.strip_prefix("SHA256:").unwrap_or(trimmed)
}
