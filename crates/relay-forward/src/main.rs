//! sftp-relay forwarder
//!
//! Pulls a file from the sender and pushes it into a directory on the
//! receiver, streaming the bytes without a local copy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use relay_core::config::{self, ForwarderConfig};
use relay_core::{logging, SigningIdentity};
use relay_forward::{Relay, SftpConnector};

#[derive(Parser)]
#[command(name = "forward")]
#[command(about = "Forward a file from the sender SFTP server to the receiver")]
#[command(version)]
struct Args {
    /// Path of the file on the source server
    file_path: String,

    /// Directory on the destination server to place the file in
    directory: String,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source server address (overrides config)
    #[arg(long)]
    source: Option<String>,

    /// Destination server address (overrides config)
    #[arg(long)]
    destination: Option<String>,

    /// Trust this host key fingerprint (repeatable)
    #[arg(long = "trust-host-key", value_name = "FINGERPRINT")]
    trust_host_key: Vec<String>,

    /// Accept any host key without verification (testing only)
    #[arg(long)]
    insecure_accept_any_host_key: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let mut config: ForwarderConfig =
        config::load_or_default(args.config.as_deref(), "forward", ForwarderConfig::default)
            .context("Failed to load configuration")?;

    if let Some(source) = args.source {
        config.source_address = source;
    }
    if let Some(destination) = args.destination {
        config.destination_address = destination;
    }
    config.trusted_host_keys.extend(args.trust_host_key);
    if args.insecure_accept_any_host_key {
        config.insecure_accept_any_host_key = true;
    }

    let identity = SigningIdentity::load(&config.private_key_path)?;
    tracing::debug!("Using identity {}", identity.fingerprint());

    let connector = SftpConnector::new(
        &config,
        identity.into_shared(),
        config.host_key_verifier(),
    );
    let relay = Relay::new(
        connector,
        config.source_address.clone(),
        config.destination_address.clone(),
    );

    let report = relay
        .run(&args.file_path, &args.directory)
        .await
        .with_context(|| format!("Failed to forward {}", args.file_path))?;

    println!("File {} forwarded to {}", args.file_path, report.destination);
    Ok(())
}
