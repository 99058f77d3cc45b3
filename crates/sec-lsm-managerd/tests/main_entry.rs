//! Integration tests for the `sec-lsm-managerd` binary entry point.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn invalid_socket_exits_with_failure() {
    let mut command = cargo_bin_cmd!("sec-lsm-managerd");
    command.args(["--socket", "carrier-pigeon://socket"]);
    command
        .assert()
        .failure()
        .code(1)
        .stderr(contains("sec-lsm-managerd: daemon bootstrap failed"));
}

#[test]
fn empty_session_pool_is_refused() {
    let dir = tempfile::TempDir::new().expect("temporary directory");
    let socket = dir.path().join("manager.socket");
    let mut command = cargo_bin_cmd!("sec-lsm-managerd");
    command
        .arg("--socket")
        .arg(format!("unix:{}", socket.display()))
        .args(["--max-clients", "0"]);
    command
        .assert()
        .failure()
        .stderr(contains("max_clients must be at least 1"));
    assert!(!socket.exists());
}
