//! CLI integration tests
//!
//! Tests the forward binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn forward() -> Command {
    Command::cargo_bin("forward")
        .expect("Failed to locate forward binary - ensure it's built before running tests")
}

#[test]
fn test_forward_help() {
    forward()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("<FILE_PATH>"))
        .stdout(predicate::str::contains("<DIRECTORY>"))
        .stdout(predicate::str::contains("--trust-host-key"));
}

#[test]
fn test_forward_requires_both_arguments() {
    forward()
        .arg("/data/report.csv")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_forward_fails_without_key() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("forward.toml");
    let missing_key = dir.path().join("no-such-key");
    std::fs::write(&config, format!("private_key_path = {:?}\n", missing_key)).unwrap();

    forward()
        .args(["/data/report.csv", "/incoming", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stdout(predicate::str::contains("forwarded").not())
        .stderr(predicate::str::contains("no-such-key"));
}
