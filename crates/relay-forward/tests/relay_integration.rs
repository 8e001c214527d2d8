//! Relay integration tests
//!
//! Runs a sender and a receiver in-process and forwards files between them.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use russh_keys::key::KeyPair;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use relay_core::config::{ForwarderConfig, ServerConfig};
use relay_core::{PinnedHostKeys, SingleUserPolicy};
use relay_forward::{ConnectionError, Relay, RelayError, SftpConnector};
use relay_server::{ActiveConnections, SftpServer};

/// A server running on an ephemeral port
struct TestServer {
    addr: SocketAddr,
    fingerprint: String,
    active: ActiveConnections,
}

async fn start_server(root: &Path, cancel: &CancellationToken) -> TestServer {
    let host_key = KeyPair::generate_ed25519().unwrap();
    let fingerprint = host_key.clone_public_key().unwrap().fingerprint();

    let server = SftpServer::new(
        host_key,
        &ServerConfig::default(),
        Arc::new(SingleUserPolicy::new("user")),
        root.to_path_buf(),
        cancel.clone(),
    );

    let active = server.active_connections();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { server.serve(listener).await });

    TestServer {
        addr,
        fingerprint,
        active,
    }
}

/// Wait until `server` has no connection left open
async fn wait_until_idle(server: &TestServer) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.active.count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("server still holds a connection");
}

fn relay_between(source: &TestServer, destination: &str, trusted: Vec<String>) -> Relay {
    let config = ForwarderConfig {
        connect_timeout: Some(Duration::from_secs(10)),
        ..ForwarderConfig::default()
    };
    let key = Arc::new(KeyPair::generate_ed25519().unwrap());
    let connector = SftpConnector::new(&config, key, Arc::new(PinnedHostKeys::new(trusted)));

    Relay::new(connector, source.addr.to_string(), destination)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_relay_report_csv() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    let receiver_root = TempDir::new().unwrap();

    let data = sender_root.path().join("data");
    let incoming = receiver_root.path().join("incoming");
    std::fs::create_dir(&data).unwrap();
    std::fs::create_dir(&incoming).unwrap();
    std::fs::write(data.join("report.csv"), b"a,b\n1,2\n").unwrap();

    let sender = start_server(sender_root.path(), &cancel).await;
    let receiver = start_server(receiver_root.path(), &cancel).await;

    let relay = relay_between(
        &sender,
        &receiver.addr.to_string(),
        vec![sender.fingerprint.clone(), receiver.fingerprint.clone()],
    );
    let report = relay
        .run(&path_str(&data.join("report.csv")), &path_str(&incoming))
        .await
        .unwrap();

    assert_eq!(report.destination, path_str(&incoming.join("report.csv")));
    assert_eq!(report.bytes, 8);
    assert_eq!(
        std::fs::read(incoming.join("report.csv")).unwrap(),
        b"a,b\n1,2\n"
    );

    cancel.cancel();
}

#[tokio::test]
async fn test_relay_zero_length_file() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    let receiver_root = TempDir::new().unwrap();
    std::fs::write(sender_root.path().join("empty.bin"), b"").unwrap();

    let sender = start_server(sender_root.path(), &cancel).await;
    let receiver = start_server(receiver_root.path(), &cancel).await;

    let relay = relay_between(
        &sender,
        &receiver.addr.to_string(),
        vec![sender.fingerprint.clone(), receiver.fingerprint.clone()],
    );
    let report = relay
        .run(
            &path_str(&sender_root.path().join("empty.bin")),
            &path_str(receiver_root.path()),
        )
        .await
        .unwrap();

    assert_eq!(report.bytes, 0);
    let copied = receiver_root.path().join("empty.bin");
    assert!(copied.is_file());
    assert_eq!(std::fs::metadata(copied).unwrap().len(), 0);

    cancel.cancel();
}

#[tokio::test]
async fn test_relay_large_file_preserves_bytes() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    let receiver_root = TempDir::new().unwrap();

    let contents: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(sender_root.path().join("blob.bin"), &contents).unwrap();

    let sender = start_server(sender_root.path(), &cancel).await;
    let receiver = start_server(receiver_root.path(), &cancel).await;

    let relay = relay_between(
        &sender,
        &receiver.addr.to_string(),
        vec![sender.fingerprint.clone(), receiver.fingerprint.clone()],
    );
    relay
        .run(
            &path_str(&sender_root.path().join("blob.bin")),
            &path_str(receiver_root.path()),
        )
        .await
        .unwrap();

    assert_eq!(
        std::fs::read(receiver_root.path().join("blob.bin")).unwrap(),
        contents
    );

    cancel.cancel();
}

#[tokio::test]
async fn test_destination_unreachable() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    let receiver_root = TempDir::new().unwrap();
    std::fs::write(sender_root.path().join("report.csv"), b"a,b\n1,2\n").unwrap();
    let sender = start_server(sender_root.path(), &cancel).await;

    // Reserve a port, then free it so nothing is listening there
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let unreachable = unused.local_addr().unwrap().to_string();
    drop(unused);

    let relay = relay_between(&sender, &unreachable, vec![sender.fingerprint.clone()]);
    let result = relay
        .run(&path_str(&sender_root.path().join("report.csv")), "/incoming")
        .await;

    match result {
        Err(RelayError::Connect { address, .. }) => assert_eq!(address, unreachable),
        other => panic!("expected a connect failure, got {:?}", other),
    }

    // The source conversation was closed, not leaked
    wait_until_idle(&sender).await;

    // and the sender serves the same file to the next relay
    let receiver = start_server(receiver_root.path(), &cancel).await;
    let relay = relay_between(
        &sender,
        &receiver.addr.to_string(),
        vec![sender.fingerprint.clone(), receiver.fingerprint.clone()],
    );
    relay
        .run(
            &path_str(&sender_root.path().join("report.csv")),
            &path_str(receiver_root.path()),
        )
        .await
        .unwrap();
    assert_eq!(
        std::fs::read(receiver_root.path().join("report.csv")).unwrap(),
        b"a,b\n1,2\n"
    );

    cancel.cancel();
}

#[tokio::test]
async fn test_relative_destination_directory() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    let receiver_root = TempDir::new().unwrap();
    std::fs::write(sender_root.path().join("f.txt"), b"relative").unwrap();
    std::fs::create_dir(receiver_root.path().join("uploads")).unwrap();

    let sender = start_server(sender_root.path(), &cancel).await;
    let receiver = start_server(receiver_root.path(), &cancel).await;

    let relay = relay_between(
        &sender,
        &receiver.addr.to_string(),
        vec![sender.fingerprint.clone(), receiver.fingerprint.clone()],
    );
    let report = relay.run("f.txt", "uploads").await.unwrap();

    assert_eq!(report.destination, "uploads/f.txt");
    assert_eq!(
        std::fs::read(receiver_root.path().join("uploads/f.txt")).unwrap(),
        b"relative"
    );
    assert!(!receiver_root.path().join("uploads/uploads").exists());

    cancel.cancel();
}

#[tokio::test]
async fn test_missing_source_file() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    let receiver_root = TempDir::new().unwrap();

    let sender = start_server(sender_root.path(), &cancel).await;
    let receiver = start_server(receiver_root.path(), &cancel).await;

    let relay = relay_between(
        &sender,
        &receiver.addr.to_string(),
        vec![sender.fingerprint.clone(), receiver.fingerprint.clone()],
    );
    let result = relay
        .run(
            &path_str(&sender_root.path().join("missing.csv")),
            &path_str(receiver_root.path()),
        )
        .await;

    assert!(matches!(result, Err(RelayError::OpenSource { .. })));
    assert!(!receiver_root.path().join("missing.csv").exists());

    cancel.cancel();
}

#[tokio::test]
async fn test_untrusted_host_key_rejected() {
    let cancel = CancellationToken::new();
    let sender_root = TempDir::new().unwrap();
    std::fs::write(sender_root.path().join("report.csv"), b"a,b\n1,2\n").unwrap();
    let sender = start_server(sender_root.path(), &cancel).await;

    let relay = relay_between(&sender, "127.0.0.1:1", vec![]);
    let result = relay
        .run(&path_str(&sender_root.path().join("report.csv")), "/incoming")
        .await;

    assert!(matches!(
        result,
        Err(RelayError::Connect {
            source: ConnectionError::HostKeyRejected { .. },
            ..
        })
    ));

    cancel.cancel();
}
