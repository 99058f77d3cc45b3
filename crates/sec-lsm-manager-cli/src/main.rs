//! CLI entrypoint for the sec-lsm-manager command runner.
//!
//! The binary delegates to [`sec_lsm_manager_cli::run`] with the process
//! arguments and standard streams.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    sec_lsm_manager_cli::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}
