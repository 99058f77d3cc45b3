//! Integration tests for the `sec-lsm-manager-cmd` binary entry point.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn help_lists_commands_without_daemon() {
    let mut command = cargo_bin_cmd!("sec-lsm-manager-cmd");
    command.args(["--socket", "unix:/nonexistent/sec-lsm-manager.socket", "help"]);
    command
        .assert()
        .success()
        .stdout(contains("permission PERMISSION"));
}

#[test]
fn unreachable_daemon_exits_with_failure() {
    let mut command = cargo_bin_cmd!("sec-lsm-manager-cmd");
    command.args(["--socket", "unix:/nonexistent/sec-lsm-manager.socket", "install"]);
    command
        .assert()
        .failure()
        .stderr(contains("failed to connect to daemon"));
}

#[test]
fn malformed_socket_is_a_usage_error() {
    let mut command = cargo_bin_cmd!("sec-lsm-manager-cmd");
    command.args(["--socket", "carrier-pigeon://coop", "install"]);
    command.assert().failure().code(2);
}
