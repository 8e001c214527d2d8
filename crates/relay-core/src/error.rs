//! Core error types for sftp-relay

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors raised while loading the private key
#[derive(Error, Debug)]
pub enum KeyError {
    /// Key file could not be read
    #[error("Failed to read private key {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key material could not be parsed
    #[error("Failed to parse private key {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: russh_keys::Error,
    },

    /// Key material is not valid text
    #[error("Private key {} is not valid UTF-8", .0.display())]
    NotText(PathBuf),

    /// Public half could not be derived
    #[error("Failed to derive public key: {0}")]
    PublicKey(#[source] russh_keys::Error),
}
