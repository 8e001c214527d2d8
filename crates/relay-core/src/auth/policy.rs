//! Authorization policies

use russh_keys::key::PublicKey;

use super::AuthorizedKeys;

/// Verdict of an authorization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Let the client in
    Accept,
    /// Refuse the attempt
    Reject,
}

/// Decides whether a user presenting a public key may log in
pub trait AuthPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Decide on a public key authentication attempt
    fn authorize(&self, user: &str, key: &PublicKey) -> AuthDecision;
}

/// Accepts any key presented for one configured username
///
/// The key itself is never checked, so this policy is not suitable for
/// untrusted networks.
#[derive(Debug, Clone)]
pub struct SingleUserPolicy {
    username: String,
}

impl SingleUserPolicy {
    /// Create a policy admitting `username`
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl AuthPolicy for SingleUserPolicy {
    fn name(&self) -> &'static str {
        "single-user"
    }

    fn authorize(&self, user: &str, _key: &PublicKey) -> AuthDecision {
        if user == self.username {
            AuthDecision::Accept
        } else {
            AuthDecision::Reject
        }
    }
}

/// Requires both the username and a listed key fingerprint
#[derive(Debug)]
pub struct AuthorizedKeysPolicy {
    username: String,
    keys: AuthorizedKeys,
}

impl AuthorizedKeysPolicy {
    /// Create a policy admitting `username` with any of `keys`
    pub fn new(username: impl Into<String>, keys: AuthorizedKeys) -> Self {
        Self {
            username: username.into(),
            keys,
        }
    }
}

impl AuthPolicy for AuthorizedKeysPolicy {
    fn name(&self) -> &'static str {
        "authorized-keys"
    }

    fn authorize(&self, user: &str, key: &PublicKey) -> AuthDecision {
        if user != self.username {
            return AuthDecision::Reject;
        }

        if self.keys.is_authorized(&key.fingerprint()) {
            AuthDecision::Accept
        } else {
            AuthDecision::Reject
        }
    }
}
