//! Policy backends driven by the install orchestrator.
//!
//! Two collaborators receive a committed [`Context`](crate::context::Context):
//! a [`PermissionBackend`] storing permission grants per security label, and a
//! [`MacBackend`] installing mandatory access control policy. Both are chosen
//! at runtime from the configuration.

pub mod mac;
pub mod permission;

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

use sec_lsm_manager_config::{Config, MacBackendKind, PermissionBackendKind};
use sec_lsm_manager_protocol::{CodecError, ErrorKind};

pub use mac::{MacBackend, SelinuxMac, SimulateMac, SmackMac};
pub use permission::{CynagoraPermissions, MemoryPermissions, PermissionBackend};

pub(crate) const BACKEND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::backend");

/// Failures reported by a policy backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend service could not be reached.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint of the service.
        endpoint: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Exchanging records with the backend service failed.
    #[error("backend transport failed: {0}")]
    Transport(#[from] CodecError),
    /// The backend service closed the connection.
    #[error("backend closed the connection")]
    Closed,
    /// The backend service answered something unexpected.
    #[error("unexpected reply to {request}: {reply}")]
    UnexpectedReply {
        /// Request verb.
        request: &'static str,
        /// Reply fields joined by spaces.
        reply: String,
    },
    /// Reading or writing a policy file failed.
    #[error("failed to {action} '{path}': {source}")]
    Filesystem {
        /// What was attempted.
        action: &'static str,
        /// File involved.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A policy tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A policy tool exited unsuccessfully.
    #[error("{program} exited with {status}")]
    ToolFailed {
        /// Program name.
        program: String,
        /// Exit status.
        status: ExitStatus,
    },
}

impl BackendError {
    /// Failure class reported to clients.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }

    pub(crate) fn filesystem(action: &'static str, path: impl ToString, source: io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.to_string(),
            source,
        }
    }
}

/// The pair of backends used by every session.
pub struct Backends {
    /// Permission store.
    pub permissions: Box<dyn PermissionBackend>,
    /// Mandatory access control implementation.
    pub mac: Box<dyn MacBackend>,
}

impl Backends {
    /// Assembles backends from explicit implementations.
    #[must_use]
    pub fn new(permissions: Box<dyn PermissionBackend>, mac: Box<dyn MacBackend>) -> Self {
        Self { permissions, mac }
    }

    /// Selects the backends named by the configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let permissions: Box<dyn PermissionBackend> = match config.permission_backend {
            PermissionBackendKind::Cynagora => {
                Box::new(CynagoraPermissions::new(config.cynagora_socket.clone()))
            }
            PermissionBackendKind::Memory => Box::new(MemoryPermissions::new()),
        };
        let mac = mac::select(resolve_mac_kind(config.mac_backend), &config.policy_dir);
        Self { permissions, mac }
    }

    /// In-process backends that leave the host untouched.
    #[must_use]
    pub fn simulated() -> Self {
        Self::new(
            Box::new(MemoryPermissions::new()),
            Box::new(SimulateMac::new()),
        )
    }

    /// Name of the selected MAC backend.
    #[must_use]
    pub fn mac_name(&self) -> &'static str {
        self.mac.name()
    }

    /// Name of the selected permission backend.
    #[must_use]
    pub fn permission_name(&self) -> &'static str {
        self.permissions.name()
    }
}

/// Replaces [`MacBackendKind::Auto`] by the implementation the kernel offers.
#[must_use]
pub fn resolve_mac_kind(kind: MacBackendKind) -> MacBackendKind {
    match kind {
        MacBackendKind::Auto if mac::smack::is_available() => MacBackendKind::Smack,
        MacBackendKind::Auto if mac::selinux::is_available() => MacBackendKind::Selinux,
        MacBackendKind::Auto => MacBackendKind::Simulate,
        explicit => explicit,
    }
}
