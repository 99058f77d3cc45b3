//! Entry point of the `sec-lsm-managerd` daemon.
//!
//! Delegates to [`sec_lsm_managerd::run_daemon`] and maps its outcome to the
//! process exit status: zero after a clean stop, one when startup fails.

use std::process::ExitCode;

fn main() -> ExitCode {
    match sec_lsm_managerd::run_daemon() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("sec-lsm-managerd: {error}");
            ExitCode::FAILURE
        }
    }
}
