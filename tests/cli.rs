//! Exit codes of the `event-receiver` binary.

use std::fs;
use std::process::Command;

fn receiver_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_event-receiver"))
}

#[test]
fn test_check_accepts_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receiver.toml");
    fs::write(&path, "[startup]\nwait_secs = 3\n").unwrap();

    let output = receiver_bin()
        .arg("--config")
        .arg(&path)
        .arg("--check")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("configuration ok"));
}

#[test]
fn test_invalid_config_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receiver.toml");
    fs::write(&path, "[startup]\nwait_secs = 0\n").unwrap();

    let output = receiver_bin()
        .arg("--config")
        .arg(&path)
        .arg("--check")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("startup.wait_secs"));
}

#[test]
fn test_failed_startup_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receiver.toml");
    let producer = dir.path().join("absent.properties");
    fs::write(
        &path,
        format!(
            "[ingress]\nbind_host = \"127.0.0.1\"\nport = 18080\ntls_port = 18443\n\n\
             [paths]\nproducer_config = {producer:?}\n"
        ),
    )
    .unwrap();

    let output = receiver_bin().arg("--config").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
