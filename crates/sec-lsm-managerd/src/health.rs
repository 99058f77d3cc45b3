//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use sec_lsm_manager_config::Config;

use crate::bootstrap::BootstrapError;
use crate::server::StopReason;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before bootstrap begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the policy backends are chosen.
    fn backends_selected(&self, permission: &str, mac: &str);

    /// Invoked when the serve loop returns.
    fn server_stopped(&self, reason: StopReason);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn backends_selected(&self, permission: &str, mac: &str) {
        (**self).backends_selected(permission, mac);
    }

    fn server_stopped(&self, reason: StopReason) {
        (**self).server_stopped(reason);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            max_clients = config.max_clients(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn backends_selected(&self, permission: &str, mac: &str) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "backends_selected",
            permission,
            mac,
            "policy backends selected"
        );
    }

    fn server_stopped(&self, reason: StopReason) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            reason = ?reason,
            "server loop finished"
        );
    }
}
