//! Relay orchestration
//!
//! Pulls one file from the source server and pushes it to the destination
//! server. Bytes are streamed straight from one remote handle to the other;
//! nothing is written locally and nothing is retried.

use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::fs::File;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::connector::{ConnectionError, RemoteFs, SftpConnector};

/// Relay failure, naming the step that failed
#[derive(Debug, Error)]
pub enum RelayError {
    /// The source path has no usable base name
    #[error("Cannot derive a file name from '{0}'")]
    InvalidSourcePath(String),

    /// Connecting to one of the servers failed
    #[error("Failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: ConnectionError,
    },

    /// The source file could not be opened for reading
    #[error("Failed to open source file {path}: {source}")]
    OpenSource {
        path: String,
        #[source]
        source: SftpError,
    },

    /// The destination file could not be created
    #[error("Failed to create destination file {path}: {source}")]
    CreateDestination {
        path: String,
        #[source]
        source: SftpError,
    },

    /// Streaming the bytes failed part way
    #[error("Failed to copy {source_path} to {destination}: {source}")]
    Copy {
        source_path: String,
        destination: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a successful relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    /// Path written on the destination server
    pub destination: String,
    /// Number of bytes copied
    pub bytes: u64,
}

/// Destination path for `source` inside `directory`
///
/// Uses the last `/`-separated component of `source`, ignoring trailing
/// slashes, and joins it onto `directory` with a single `/`.
pub fn destination_path(source: &str, directory: &str) -> Result<String, RelayError> {
    let trimmed = source.trim_end_matches('/');
    let base = match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    };

    if base.is_empty() || base == "." || base == ".." {
        return Err(RelayError::InvalidSourcePath(source.to_string()));
    }

    if directory.is_empty() {
        return Ok(base.to_string());
    }

    Ok(format!("{}/{}", directory.trim_end_matches('/'), base))
}

/// Forwards files from a source server to a destination server
pub struct Relay {
    connector: SftpConnector,
    source_address: String,
    destination_address: String,
}

impl Relay {
    /// Create a relay between two server addresses
    pub fn new(
        connector: SftpConnector,
        source_address: impl Into<String>,
        destination_address: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            source_address: source_address.into(),
            destination_address: destination_address.into(),
        }
    }

    /// Copy `source_path` on the source server into `directory` on the destination
    ///
    /// Handles opened before a failure are released before returning. A
    /// failed copy leaves whatever reached the destination in place.
    pub async fn run(&self, source_path: &str, directory: &str) -> Result<RelayReport, RelayError> {
        let destination = destination_path(source_path, directory)?;

        let source_fs = self.connect(&self.source_address).await?;
        let mut reader = match source_fs.open_read(source_path).await {
            Ok(file) => file,
            Err(e) => {
                close_fs(source_fs).await;
                return Err(RelayError::OpenSource {
                    path: source_path.to_string(),
                    source: e,
                });
            }
        };

        let destination_fs = match self.connect(&self.destination_address).await {
            Ok(fs) => fs,
            Err(e) => {
                release(&mut reader, source_path).await;
                close_fs(source_fs).await;
                return Err(e);
            }
        };

        let mut writer = match destination_fs.create(&destination).await {
            Ok(file) => file,
            Err(e) => {
                release(&mut reader, source_path).await;
                close_fs(source_fs).await;
                close_fs(destination_fs).await;
                return Err(RelayError::CreateDestination {
                    path: destination,
                    source: e,
                });
            }
        };

        tracing::debug!(
            "Copying {}:{} to {}:{}",
            self.source_address,
            source_path,
            self.destination_address,
            destination
        );

        let copied = match tokio::io::copy(&mut reader, &mut writer).await {
            Ok(bytes) => writer.shutdown().await.map(|_| bytes),
            Err(e) => {
                release(&mut writer, &destination).await;
                Err(e)
            }
        };

        release(&mut reader, source_path).await;
        close_fs(source_fs).await;
        close_fs(destination_fs).await;

        let bytes = copied.map_err(|e| RelayError::Copy {
            source_path: source_path.to_string(),
            destination: destination.clone(),
            source: e,
        })?;

        tracing::info!("Relayed {} bytes to {}", bytes, destination);
        Ok(RelayReport { destination, bytes })
    }

    async fn connect(&self, address: &str) -> Result<RemoteFs, RelayError> {
        self.connector
            .connect(address)
            .await
            .map_err(|e| RelayError::Connect {
                address: address.to_string(),
                source: e,
            })
    }
}

/// Close a remote handle, logging failures
async fn release(file: &mut File, path: &str) {
    if let Err(e) = file.shutdown().await {
        tracing::warn!("Failed to close remote handle for {}: {}", path, e);
    }
}

/// End a conversation, logging failures
async fn close_fs(fs: RemoteFs) {
    let address = fs.address().to_string();
    if let Err(e) = fs.close().await {
        tracing::warn!("Failed to disconnect from {}: {}", address, e);
    }
}
