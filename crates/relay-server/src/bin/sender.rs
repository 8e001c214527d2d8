//! sftp-relay sender
//!
//! Source end of a relay: exposes a file for the forwarder to pull.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use relay_core::config::{self, ServerConfig, ServerRole};
use relay_core::{logging, SigningIdentity};
use relay_server::{shutdown_on_signal, SftpServer};

#[derive(Parser)]
#[command(name = "sender")]
#[command(about = "SFTP server exposing a file to forward")]
#[command(version)]
struct Args {
    /// File this server exposes for reading
    file_path: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let role = ServerRole::Sender;
    let config: ServerConfig = config::load_or_default(args.config.as_deref(), role.program(), || {
        ServerConfig::for_role(role)
    })
    .context("Failed to load configuration")?;

    let metadata = tokio::fs::metadata(&args.file_path)
        .await
        .with_context(|| format!("Cannot expose {:?}", args.file_path))?;
    if !metadata.is_file() {
        anyhow::bail!("{:?} is not a regular file", args.file_path);
    }
    tracing::info!("Exposing {:?} ({} bytes)", args.file_path, metadata.len());

    let identity = SigningIdentity::load(&config.host_key_path)?;
    let policy = config.auth_policy()?;
    let working_dir = std::env::current_dir().context("Failed to resolve working directory")?;

    let cancel = CancellationToken::new();
    shutdown_on_signal(cancel.clone());

    let bind_addr = args.bind.unwrap_or_else(|| config.bind_address_for(role));
    let server = SftpServer::new(identity.into_key_pair(), &config, policy, working_dir, cancel);
    server.run(&bind_addr).await?;

    tracing::info!("Sender shutdown complete");
    Ok(())
}
