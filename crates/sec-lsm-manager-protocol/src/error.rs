//! Errors raised by the record codec.

use std::io;

use thiserror::Error;

use crate::wire::ErrorKind;
use crate::{BUFFER_SIZE, MAX_FIELDS};

/// Failures of encoding, decoding or moving bytes through a transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The output buffer cannot hold the record; it was cancelled.
    #[error("output buffer of {BUFFER_SIZE} bytes is full")]
    BufferFull,
    /// A record grew beyond the field limit while encoding; it was cancelled.
    #[error("record exceeds {MAX_FIELDS} fields")]
    TooManyFields,
    /// An inbound record does not fit the input buffer or the field limit.
    #[error("inbound record exceeds the codec limits")]
    MessageTooBig,
    /// The transport has no data or room right now.
    #[error("transport would block")]
    WouldBlock,
    /// The transport failed.
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Failure class reported to peers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BufferFull => ErrorKind::BufferFull,
            Self::TooManyFields | Self::MessageTooBig => ErrorKind::MessageTooBig,
            Self::WouldBlock | Self::Io(_) => ErrorKind::Internal,
        }
    }
}
