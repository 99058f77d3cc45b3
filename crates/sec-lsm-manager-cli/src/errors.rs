//! Error types raised by the client library and the command runner.

use std::io;

use thiserror::Error;

use sec_lsm_manager_protocol::{CodecError, ErrorKind};

/// Failures of a client request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon host name did not resolve.
    #[error("failed to resolve daemon address {endpoint}: {source}")]
    Resolve {
        /// Endpoint being resolved.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// The daemon socket refused the connection.
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        /// Endpoint being connected.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Encoding or writing a request failed.
    #[error("failed to send request: {0}")]
    Send(#[source] CodecError),
    /// Reading or decoding a reply failed.
    #[error("failed to read reply: {0}")]
    Receive(#[source] CodecError),
    /// The daemon hung up before completing a reply.
    #[error("daemon closed the connection")]
    Closed,
    /// The daemon answered with a record outside the reply vocabulary.
    #[error("unexpected reply '{0}'")]
    UnexpectedReply(String),
    /// The daemon refused the request with `error <token>`.
    #[error("{command} refused: {token}")]
    Refused {
        /// Command word of the refused request.
        command: String,
        /// Error token carried by the reply.
        token: String,
    },
}

impl ClientError {
    /// Negative errno-style status describing the failure.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Resolve { .. } => -libc::EADDRNOTAVAIL,
            Self::Connect { source, .. } => -source.raw_os_error().unwrap_or(libc::ECONNREFUSED),
            Self::Send(error) | Self::Receive(error) => codec_code(error),
            Self::Closed => -libc::EPIPE,
            Self::UnexpectedReply(_) => -libc::EPROTO,
            Self::Refused { token, .. } => token
                .parse::<ErrorKind>()
                .map_or(-libc::EPROTO, |kind| -errno(kind)),
        }
    }

    /// Whether the connection can no longer carry requests.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Refused { token, .. } => token == ErrorKind::Protocol.token(),
            _ => true,
        }
    }
}

/// Errno value reported for each failure class.
#[must_use]
pub const fn errno(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidArgument => libc::EINVAL,
        ErrorKind::AlreadyExists => libc::EEXIST,
        ErrorKind::NotFound => libc::ENOENT,
        ErrorKind::AccessDenied => libc::EACCES,
        ErrorKind::NotADirectory => libc::ENOTDIR,
        ErrorKind::Unrecoverable => libc::ENOTRECOVERABLE,
        ErrorKind::OutOfMemory => libc::ENOMEM,
        ErrorKind::Protocol => libc::EPROTO,
        ErrorKind::BufferFull => libc::ENOBUFS,
        ErrorKind::MessageTooBig => libc::EMSGSIZE,
        ErrorKind::Internal => libc::ECANCELED,
    }
}

fn codec_code(error: &CodecError) -> i32 {
    match error {
        CodecError::Io(source) => -source.raw_os_error().unwrap_or(libc::EIO),
        CodecError::WouldBlock => -libc::EAGAIN,
        other => -errno(other.kind()),
    }
}

/// Failures of the command runner.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("failed to read commands: {0}")]
    ReadInput(#[source] io::Error),
    #[error("failed to write replies: {0}")]
    WriteOutput(#[source] io::Error),
}

impl AppError {
    pub(crate) fn code(&self) -> i32 {
        match self {
            Self::Client(error) => error.code(),
            Self::ReadInput(error) | Self::WriteOutput(error) => {
                -error.raw_os_error().unwrap_or(libc::EIO)
            }
        }
    }
}
