//! Daemon bootstrap orchestration.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use ortho_config::OrthoError;
use thiserror::Error;

use sec_lsm_manager_config::{Config, SocketPreparationError};

use crate::backends::Backends;
use crate::health::HealthReporter;
use crate::server::{ListenerError, Server, ServerOptions, SocketListener, StopReason};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader returning a configuration resolved beforehand.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The session pool would hold no client.
    #[error("max_clients must be at least 1, got {value}")]
    InvalidMaxClients {
        /// Configured value.
        value: usize,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Socket preparation failed.
    #[error("failed to prepare daemon socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// Binding the listening socket failed.
    #[error("failed to bind daemon socket: {source}")]
    Listener {
        /// Underlying listener error.
        #[source]
        source: ListenerError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    backends: Backends,
    listener: SocketListener,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Accessor for the bound listener.
    #[must_use]
    pub const fn listener(&self) -> &SocketListener {
        &self.listener
    }

    /// Accessor for the selected backends.
    #[must_use]
    pub const fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Serves clients until `shutdown` is raised or the idle timeout expires.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when waiting for socket readiness fails.
    pub fn serve(self, shutdown: Arc<AtomicBool>) -> Result<StopReason, ListenerError> {
        let Self {
            config,
            backends,
            listener,
            reporter,
            ..
        } = self;
        let options = ServerOptions {
            max_clients: config.max_clients(),
            idle_timeout: config.idle_timeout(),
            allow_empty_records: config.allow_empty_records,
        };
        let mut server = Server::new(listener, backends, options).with_shutdown_flag(shutdown);
        let reason = server.serve()?;
        reporter.server_stopped(reason);
        Ok(reason)
    }
}

/// Bootstraps the daemon using the supplied collaborators.
///
/// # Errors
///
/// Returns [`BootstrapError`] describing the first step that failed; the
/// reporter is notified before the error is returned.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();
    match prepare(loader, &*reporter) {
        Ok((config, backends, listener, telemetry)) => {
            reporter.bootstrap_succeeded(&config);
            Ok(Daemon {
                config,
                backends,
                listener,
                telemetry,
                reporter,
            })
        }
        Err(error) => {
            reporter.bootstrap_failed(&error);
            Err(error)
        }
    }
}

fn prepare(
    loader: &dyn ConfigLoader,
    reporter: &dyn HealthReporter,
) -> Result<(Config, Backends, SocketListener, TelemetryHandle), BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;
    if config.max_clients() == 0 {
        return Err(BootstrapError::InvalidMaxClients {
            value: config.max_clients(),
        });
    }
    let telemetry =
        telemetry::initialise(&config).map_err(|source| BootstrapError::Telemetry { source })?;
    config
        .socket()
        .prepare_filesystem()
        .map_err(|source| BootstrapError::Socket { source })?;

    let backends = Backends::from_config(&config);
    reporter.backends_selected(backends.permission_name(), backends.mac_name());

    let listener = SocketListener::bind(config.socket())
        .map_err(|source| BootstrapError::Listener { source })?;
    Ok((config, backends, listener, telemetry))
}
