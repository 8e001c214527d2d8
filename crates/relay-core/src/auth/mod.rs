//! Client authorization for the relay servers
//!
//! The transport asks an [`AuthPolicy`] whether a user presenting a given
//! public key may log in. The default policy only checks the username.

mod keys;
mod policy;

pub use keys::AuthorizedKeys;
pub use policy::{AuthDecision, AuthPolicy, AuthorizedKeysPolicy, SingleUserPolicy};
