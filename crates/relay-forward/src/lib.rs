//! relay-forward: Streams a file between two SFTP servers
//!
//! The forwarder opens an authenticated SFTP conversation with the source
//! server and another with the destination server, then copies the source
//! file into the destination directory without staging it locally.

pub mod connector;
pub mod relay;

pub use connector::{ConnectionError, RemoteFs, SftpConnector};
pub use relay::{destination_path, Relay, RelayError, RelayReport};
