//! Supervises daemon launch sequencing.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::info;

use crate::StructuredHealthReporter;
use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::HealthReporter;
use crate::server::StopReason;

use super::errors::LaunchError;
use super::{PROCESS_TARGET, privileges, signals};

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when signal installation, bootstrap, the
/// privilege drop or the serve loop fails.
pub fn run_daemon() -> Result<StopReason, LaunchError> {
    let shutdown =
        signals::install_shutdown_flag().map_err(|source| LaunchError::Signals { source })?;
    let reporter = Arc::new(StructuredHealthReporter::new());
    run_daemon_with(&SystemConfigLoader, reporter, shutdown)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    shutdown: Arc<AtomicBool>,
) -> Result<StopReason, LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    let config = daemon.config();
    if let Err(error) = privileges::drop_privileges(config.user.as_deref(), config.group.as_deref())
    {
        daemon.listener().cleanup();
        return Err(error.into());
    }
    info!(
        target: PROCESS_TARGET,
        pid = std::process::id(),
        "starting daemon runtime"
    );
    let reason = daemon.serve(shutdown)?;
    info!(target: PROCESS_TARGET, ?reason, "shutdown sequence completed");
    Ok(reason)
}
