//! Validation failures raised by [`Context`](super::Context) mutators.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use sec_lsm_manager_protocol::ErrorKind;

/// Errors reported while staging an application context.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context latched an earlier failure and must be cleared.
    #[error("context is in its error state; clear it first")]
    Flagged,
    /// The application id does not match `[A-Za-z0-9_-]{2,200}`.
    #[error("invalid application id '{0}'")]
    InvalidId(String),
    /// The application id was already set.
    #[error("application id already set to '{0}'")]
    IdAlreadySet(String),
    /// The permission string is malformed.
    #[error("invalid permission '{0}'")]
    InvalidPermission(String),
    /// The permission was already added.
    #[error("permission '{0}' already added")]
    PermissionExists(String),
    /// The path string is malformed.
    #[error("invalid path '{0}'")]
    InvalidPath(String),
    /// The path type is not one of the known types.
    #[error("unknown path type '{0}'")]
    UnknownPathType(String),
    /// The path was already added.
    #[error("path '{0}' already added")]
    PathExists(Utf8PathBuf),
    /// A plug already imports into this directory.
    #[error("plug import directory '{0}' already used")]
    PlugExists(Utf8PathBuf),
    /// The path does not exist.
    #[error("path '{0}' not found")]
    NotFound(Utf8PathBuf),
    /// The path cannot be inspected.
    #[error("path '{0}' is not accessible")]
    AccessDenied(Utf8PathBuf),
    /// The path exists but is not a directory.
    #[error("path '{0}' is not a directory")]
    NotADirectory(Utf8PathBuf),
    /// Inspecting the path failed for another reason.
    #[error("failed to inspect '{path}': {source}")]
    Inspect {
        /// Path being inspected.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ContextError {
    /// Failure class reported to clients.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Flagged => ErrorKind::Unrecoverable,
            Self::InvalidId(_)
            | Self::InvalidPermission(_)
            | Self::InvalidPath(_)
            | Self::UnknownPathType(_) => ErrorKind::InvalidArgument,
            Self::IdAlreadySet(_)
            | Self::PermissionExists(_)
            | Self::PathExists(_)
            | Self::PlugExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::Inspect { .. } => ErrorKind::Internal,
        }
    }
}
