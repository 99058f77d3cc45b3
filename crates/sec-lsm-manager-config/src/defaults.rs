use camino::Utf8PathBuf;

use crate::selectors::{LogFormat, MacBackendKind, PermissionBackendKind};
use crate::socket::SocketEndpoint;

/// Default listening socket of the daemon.
pub const DEFAULT_SOCKET: &str = "/run/sec-lsm-manager/sec-lsm-manager.socket";

/// Default administration socket of the cynagora permission service.
pub const DEFAULT_CYNAGORA_SOCKET: &str = "/var/run/cynagora/cynagora.admin";

/// Default directory holding generated policy artefacts.
pub const DEFAULT_POLICY_DIR: &str = "/var/lib/sec-lsm-manager";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default idle timeout in seconds; zero disables idle disconnection.
pub const DEFAULT_IDLE_TIMEOUT: u64 = 0;

/// Default number of concurrently served clients.
pub const DEFAULT_MAX_CLIENTS: usize = 3;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default listening endpoint of the daemon.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::unix(DEFAULT_SOCKET)
}

/// Default endpoint of the cynagora administration socket.
#[must_use]
pub fn default_cynagora_endpoint() -> SocketEndpoint {
    SocketEndpoint::unix(DEFAULT_CYNAGORA_SOCKET)
}

/// Default policy directory.
#[must_use]
pub fn default_policy_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_POLICY_DIR)
}

/// Default MAC backend selector.
#[must_use]
pub const fn default_mac_backend() -> MacBackendKind {
    MacBackendKind::Auto
}

/// Default permission backend selector.
#[must_use]
pub const fn default_permission_backend() -> PermissionBackendKind {
    PermissionBackendKind::Cynagora
}
