//! Vocabulary of the sec-lsm-manager protocol.

use strum::{Display, EnumString, IntoStaticStr};

/// First field of a version negotiation record.
pub const MAGIC: &str = "sec-lsm-manager";

/// Protocol version assumed when a client skips negotiation.
pub const DEFAULT_VERSION: u32 = 1;

/// Protocol versions the daemon understands.
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Command words sent by clients.
pub mod command {
    /// Resets the staged context.
    pub const CLEAR: &str = "clear";
    /// Streams the staged context back.
    pub const DISPLAY: &str = "display";
    /// Sets the application identifier.
    pub const ID: &str = "id";
    /// Commits the staged context.
    pub const INSTALL: &str = "install";
    /// Queries or switches protocol logging.
    pub const LOG: &str = "log";
    /// Adds a labelled path.
    pub const PATH: &str = "path";
    /// Adds a permission.
    pub const PERMISSION: &str = "permission";
    /// Adds a plug.
    pub const PLUG: &str = "plug";
    /// Retracts the staged context.
    pub const UNINSTALL: &str = "uninstall";
}

/// Reply words sent by the daemon.
pub mod reply {
    /// Successful completion, optionally followed by data.
    pub const DONE: &str = "done";
    /// Failure, followed by an [`ErrorKind`](super::ErrorKind) token.
    pub const ERROR: &str = "error";
    /// One line of `display` output.
    pub const STRING: &str = "string";
}

/// Argument switching protocol logging on.
pub const LOG_ON: &str = "on";

/// Argument switching protocol logging off.
pub const LOG_OFF: &str = "off";

/// Failure classes reported to clients, each with a fixed wire token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ErrorKind {
    /// Malformed identifier, path, type or permission.
    #[strum(serialize = "invalid")]
    InvalidArgument,
    /// Duplicate identifier, path, permission or plug.
    #[strum(serialize = "exists")]
    AlreadyExists,
    /// Referenced path or directory is absent.
    #[strum(serialize = "not-found")]
    NotFound,
    /// Path not accessible or plug export not permitted.
    #[strum(serialize = "forbidden")]
    AccessDenied,
    /// Plug directory exists but is not a directory.
    #[strum(serialize = "not-a-directory")]
    NotADirectory,
    /// The context is latched in its error state.
    #[strum(serialize = "unrecoverable")]
    Unrecoverable,
    /// Allocation failed.
    #[strum(serialize = "out-of-memory")]
    OutOfMemory,
    /// Malformed or unrecognised wire input.
    #[strum(serialize = "protocol")]
    Protocol,
    /// The output buffer cannot take the record.
    #[strum(serialize = "buffer-full")]
    BufferFull,
    /// A record exceeds the codec limits.
    #[strum(serialize = "too-big")]
    MessageTooBig,
    /// A backend failed for an unclassified reason.
    #[strum(serialize = "internal")]
    Internal,
}

impl ErrorKind {
    /// Wire token carried by an `error` reply.
    #[must_use]
    pub fn token(self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::InvalidArgument, "invalid")]
    #[case(ErrorKind::AlreadyExists, "exists")]
    #[case(ErrorKind::NotFound, "not-found")]
    #[case(ErrorKind::AccessDenied, "forbidden")]
    #[case(ErrorKind::NotADirectory, "not-a-directory")]
    #[case(ErrorKind::Unrecoverable, "unrecoverable")]
    #[case(ErrorKind::OutOfMemory, "out-of-memory")]
    #[case(ErrorKind::Protocol, "protocol")]
    #[case(ErrorKind::BufferFull, "buffer-full")]
    #[case(ErrorKind::MessageTooBig, "too-big")]
    #[case(ErrorKind::Internal, "internal")]
    fn tokens_are_stable(#[case] kind: ErrorKind, #[case] token: &str) {
        assert_eq!(kind.token(), token);
        assert_eq!(token.parse::<ErrorKind>().expect("parse token"), kind);
    }
}
