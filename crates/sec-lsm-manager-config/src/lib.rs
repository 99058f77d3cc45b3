//! Shared configuration for the sec-lsm-manager daemon and client.
//!
//! Values are layered by `ortho_config`: command-line flags win over
//! `SEC_LSM_MANAGER_*` environment variables, which win over configuration
//! files, which win over the built-in defaults exposed by [`defaults`].

pub mod defaults;
mod selectors;
mod socket;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};

pub use defaults::{
    default_cynagora_endpoint, default_log_filter, default_log_format, default_socket_endpoint,
};
pub use selectors::{LogFormat, MacBackendKind, PermissionBackendKind};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Runtime configuration of the daemon and its command-line client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SEC_LSM_MANAGER")]
pub struct Config {
    /// Endpoint the daemon listens on and the client connects to.
    #[ortho_config(default = defaults::default_socket_endpoint(), cli_short = 's')]
    pub socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Telemetry output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Seconds of client inactivity before disconnection; zero never expires.
    #[ortho_config(default = defaults::DEFAULT_IDLE_TIMEOUT, cli_short = 't')]
    pub idle_timeout: u64,
    /// Maximum number of concurrently served clients.
    #[ortho_config(default = defaults::DEFAULT_MAX_CLIENTS)]
    pub max_clients: usize,
    /// Account the daemon switches to once its socket is bound.
    #[ortho_config(cli_short = 'u')]
    pub user: Option<String>,
    /// Group the daemon switches to once its socket is bound.
    #[ortho_config(cli_short = 'g')]
    pub group: Option<String>,
    /// Mandatory access control backend.
    #[ortho_config(default = defaults::default_mac_backend())]
    pub mac_backend: MacBackendKind,
    /// Permission store backend.
    #[ortho_config(default = defaults::default_permission_backend())]
    pub permission_backend: PermissionBackendKind,
    /// Endpoint of the cynagora administration socket.
    #[ortho_config(default = defaults::default_cynagora_endpoint())]
    pub cynagora_socket: SocketEndpoint,
    /// Directory receiving generated policy files.
    #[ortho_config(default = defaults::default_policy_dir())]
    pub policy_dir: Utf8PathBuf,
    /// Surface bare record separators as empty records instead of skipping them.
    #[ortho_config(default = false)]
    pub allow_empty_records: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: defaults::default_socket_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            idle_timeout: defaults::DEFAULT_IDLE_TIMEOUT,
            max_clients: defaults::DEFAULT_MAX_CLIENTS,
            user: None,
            group: None,
            mac_backend: defaults::default_mac_backend(),
            permission_backend: defaults::default_permission_backend(),
            cynagora_socket: defaults::default_cynagora_endpoint(),
            policy_dir: defaults::default_policy_dir(),
            allow_empty_records: false,
        }
    }
}

impl Config {
    /// Loads the configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when a layer fails to parse.
    pub fn load() -> OrthoResult<Self> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the configuration from an explicit argument list.
    ///
    /// # Errors
    ///
    /// Returns the aggregated `ortho_config` error when a layer fails to parse.
    pub fn load_from_iter<I, T>(iter: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(iter)
    }

    /// Endpoint the daemon listens on.
    #[must_use]
    pub const fn socket(&self) -> &SocketEndpoint {
        &self.socket
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured telemetry format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Idle timeout, `None` when sessions never expire.
    #[must_use]
    pub const fn idle_timeout(&self) -> Option<std::time::Duration> {
        match self.idle_timeout {
            0 => None,
            seconds => Some(std::time::Duration::from_secs(seconds)),
        }
    }

    /// Maximum number of concurrently served clients.
    #[must_use]
    pub const fn max_clients(&self) -> usize {
        self.max_clients
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(
            config.socket().to_string(),
            "unix:/run/sec-lsm-manager/sec-lsm-manager.socket"
        );
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.max_clients(), 3);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.mac_backend, MacBackendKind::Auto);
        assert_eq!(config.permission_backend, PermissionBackendKind::Cynagora);
        assert!(!config.allow_empty_records);
    }

    #[test]
    fn idle_timeout_converts_seconds() {
        let config = Config {
            idle_timeout: 7,
            ..Config::default()
        };
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(7)));
    }
}
