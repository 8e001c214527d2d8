//! SSH server listener
//!
//! Accepts incoming connections and spawns a session task for each client.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use russh_keys::key::KeyPair;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use relay_core::config::ServerConfig;
use relay_core::AuthPolicy;

use crate::server::handler::{ConnectionHandler, TransportConfig};

/// SSH server exposing the SFTP subsystem
pub struct SftpServer {
    /// Transport configuration
    config: TransportConfig,
    /// Authorization policy applied to every connection
    policy: Arc<dyn AuthPolicy>,
    /// Directory relative SFTP paths resolve against
    file_root: Arc<PathBuf>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
    /// Connections whose session task is still running
    active: ActiveConnections,
}

/// Live count of a server's connections
#[derive(Debug, Clone, Default)]
pub struct ActiveConnections(Arc<AtomicUsize>);

impl ActiveConnections {
    /// Number of connections currently being served
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn track(&self) -> ConnectionGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard(Arc::clone(&self.0))
    }
}

/// Decrements the count when the session task ends
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SftpServer {
    /// Create a new SFTP server
    pub fn new(
        host_key: KeyPair,
        config: &ServerConfig,
        policy: Arc<dyn AuthPolicy>,
        file_root: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config: TransportConfig::new(host_key, config),
            policy,
            file_root: Arc::new(file_root),
            cancel,
            active: ActiveConnections::default(),
        }
    }

    /// Handle on the number of connections being served
    pub fn active_connections(&self) -> ActiveConnections {
        self.active.clone()
    }

    /// Bind `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;

        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("SFTP server listening on {}", local_addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("SFTP server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            self.handle_connection(socket, peer_addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Hand a new connection to its own session task
    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::info!("New connection from {}", peer_addr);

        let config = Arc::clone(&self.config.ssh_config);
        let handler = ConnectionHandler::new(
            peer_addr,
            Arc::clone(&self.policy),
            Arc::clone(&self.file_root),
        );

        let guard = self.active.track();

        tokio::spawn(async move {
            let _guard = guard;
            let session = match russh::server::run_stream(config, socket, handler).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!("Handshake with {} failed: {}", peer_addr, e);
                    return;
                }
            };

            match session.await {
                Ok(()) => {
                    tracing::info!("Connection from {} closed normally", peer_addr);
                }
                Err(e) => {
                    tracing::warn!("Connection from {} closed with error: {}", peer_addr, e);
                }
            }
        });
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
pub fn shutdown_on_signal(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });
}
