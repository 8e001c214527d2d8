//! relay-core: Configuration, identities and trust policies for sftp-relay
//!
//! This crate provides the pieces shared by the relay servers and the
//! forwarding client: configuration structures, the signing identity
//! loaded from the private key file, the server-side authorization
//! policies and the client-side host key verifiers.

pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod trust;

pub use auth::{AuthDecision, AuthPolicy, AuthorizedKeysPolicy, SingleUserPolicy};
pub use error::{ConfigError, KeyError};
pub use identity::SigningIdentity;
pub use trust::{HostKeyVerifier, InsecureAcceptAnyHostKey, PinnedHostKeys};
