//! relay-server: SSH servers exposing the SFTP subsystem
//!
//! Both ends of a relay run this server: the sender exposes the file to
//! forward and the receiver accepts the upload. Each accepted connection
//! gets its own session task; each `session` channel on it negotiates the
//! SFTP subsystem independently and is then served by its own file server.

pub mod server;
pub mod session;
pub mod sftp;

pub use server::{
    shutdown_on_signal, ActiveConnections, ConnectionHandler, SftpServer, TransportConfig,
};
pub use sftp::FileServer;
