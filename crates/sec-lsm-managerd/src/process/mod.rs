//! Process-level concerns: launch sequencing, privilege drop and signals.

mod errors;
pub(crate) mod launch;
pub(crate) mod privileges;
pub(crate) mod signals;

pub use errors::LaunchError;
pub use launch::run_daemon;
pub use privileges::PrivilegeError;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
