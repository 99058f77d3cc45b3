//! Privileged daemon installing and removing application security policies.
//!
//! Clients connect over a local socket and speak the line-oriented record
//! protocol of [`sec_lsm_manager_protocol`]. Each connection owns a
//! [`Session`] that accumulates an application description (its
//! [`Context`]) and then asks for it to be installed or uninstalled. The
//! [`action`] module turns that request into permission grants and
//! mandatory access control labels, rolling back the permissions when
//! labelling fails.
//!
//! The bootstrap sequence loads the layered configuration, initialises
//! structured telemetry, prepares the socket directory, selects the policy
//! backends and binds the listener. Health reporting hooks emit structured
//! events at each stage so operators can diagnose failures quickly. The
//! [`Server`] then multiplexes every client on a single thread until a
//! termination signal arrives or the idle timeout expires.

pub mod action;
pub mod backends;
mod bootstrap;
pub mod context;
mod health;
mod process;
pub mod server;
pub mod session;
mod telemetry;

pub use backends::{BackendError, Backends, MacBackend, PermissionBackend};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use context::{Context, ContextError, PathType};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, PrivilegeError, run_daemon};
pub use server::{Server, ServerOptions, StopReason};
pub use session::{LogSwitch, Session, SessionState};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
