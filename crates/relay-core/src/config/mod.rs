//! Configuration management for sftp-relay

mod forwarder;
pub mod serde_utils;
mod server;

pub use forwarder::ForwarderConfig;
pub use server::{ServerConfig, ServerRole};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Default location of the private key, relative to the working directory
pub const DEFAULT_KEY_PATH: &str = "../keys/id_rsa";

/// Default username accepted by the servers and presented by the forwarder
pub const DEFAULT_USERNAME: &str = "user";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sftp-relay")
}

/// Get the default configuration file path for a program (`sender`, `receiver`, `forward`)
pub fn default_config_path(program: &str) -> PathBuf {
    default_config_dir().join(format!("{}.toml", program))
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from an explicit path, or from the program's default path if present
///
/// Falls back to `fallback` when no explicit path is given and the default file is absent
/// or unreadable.
pub fn load_or_default<T, F>(explicit: Option<&Path>, program: &str, fallback: F) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce() -> T,
{
    if let Some(path) = explicit {
        return load_config(path);
    }

    let default_path = default_config_path(program);
    if default_path.exists() {
        match load_config(&default_path) {
            Ok(config) => return Ok(config),
            Err(e) => {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            }
        }
    } else {
        tracing::info!("Using default configuration");
    }

    Ok(fallback())
}
