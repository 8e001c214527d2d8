//! SSH server implementation

mod handler;
mod listener;

pub use handler::{ConnectionHandler, TransportConfig};
pub use listener::{shutdown_on_signal, ActiveConnections, SftpServer};
