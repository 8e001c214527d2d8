//! Signing identity loaded from the private key file
//!
//! The same identity serves as host key for the servers and as the
//! authentication credential for the forwarder.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use russh_keys::key::KeyPair;

use crate::error::KeyError;

/// Private key plus its public fingerprint
pub struct SigningIdentity {
    key: KeyPair,
    fingerprint: String,
}

impl SigningIdentity {
    /// Read and parse an unencrypted private key
    ///
    /// Ed25519 keys load from OpenSSH or PKCS#8 PEM files. PKCS#1
    /// `RSA PRIVATE KEY` files (the usual `id_rsa` layout) go through the
    /// same decoder but need russh-keys built with its `openssl` feature,
    /// which this workspace does not enable; without it they are reported
    /// as [`KeyError::Parse`].
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        let bytes = std::fs::read(path).map_err(|source| KeyError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let text =
            String::from_utf8(bytes).map_err(|_| KeyError::NotText(path.to_path_buf()))?;

        let key = russh_keys::decode_secret_key(&text, None).map_err(|source| KeyError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let identity = Self::from_key_pair(key)?;
        tracing::info!("Loaded private key from {:?} ({})", path, identity.fingerprint);
        Ok(identity)
    }

    /// Wrap an already decoded key pair
    pub fn from_key_pair(key: KeyPair) -> Result<Self, KeyError> {
        let fingerprint = key
            .clone_public_key()
            .map_err(KeyError::PublicKey)?
            .fingerprint();

        Ok(Self { key, fingerprint })
    }

    /// SHA-256 fingerprint of the public half
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Borrow the key pair
    pub fn key_pair(&self) -> &KeyPair {
        &self.key
    }

    /// Take the key pair, for use as a server host key
    pub fn into_key_pair(self) -> KeyPair {
        self.key
    }

    /// Take the key pair behind an `Arc`, for client authentication
    pub fn into_shared(self) -> Arc<KeyPair> {
        Arc::new(self.key)
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}
