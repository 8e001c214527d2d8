//! sftp-relay receiver
//!
//! Destination end of a relay: accepts SFTP uploads into a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use relay_core::config::{self, ServerConfig, ServerRole};
use relay_core::{logging, SigningIdentity};
use relay_server::{shutdown_on_signal, SftpServer};

#[derive(Parser)]
#[command(name = "receiver")]
#[command(about = "SFTP server receiving forwarded files")]
#[command(version)]
struct Args {
    /// Directory uploads are stored in (created if absent)
    upload_directory: PathBuf,

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

    let role = ServerRole::Receiver;
    let config: ServerConfig = config::load_or_default(args.config.as_deref(), role.program(), || {
        ServerConfig::for_role(role)
    })
    .context("Failed to load configuration")?;

    tokio::fs::create_dir_all(&args.upload_directory)
        .await
        .with_context(|| format!("Failed to create upload directory {:?}", args.upload_directory))?;

    let identity = SigningIdentity::load(&config.host_key_path)?;
    let policy = config.auth_policy()?;
    let working_dir = std::env::current_dir().context("Failed to resolve working directory")?;
    tracing::info!("Accepting uploads into {:?}", args.upload_directory);

    let cancel = CancellationToken::new();
    shutdown_on_signal(cancel.clone());

    let bind_addr = args.bind.unwrap_or_else(|| config.bind_address_for(role));
    let server = SftpServer::new(identity.into_key_pair(), &config, policy, working_dir, cancel);
    server.run(&bind_addr).await?;

    tracing::info!("Receiver shutdown complete");
    Ok(())
}
