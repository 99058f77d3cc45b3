//! Per-connection protocol state machine.
//!
//! A [`Session`] owns one decoder, one encoder and one [`Context`]. The first
//! record may negotiate the protocol version; every later record is parsed
//! into a [`Command`] and answered with `done` or `error <token>`. A protocol
//! violation moves the session to [`SessionState::Invalid`], after which no
//! buffered record is processed.

mod command;
mod log_switch;

use std::io::{Read, Write};
use std::ops::ControlFlow;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use sec_lsm_manager_protocol::wire::{
    DEFAULT_VERSION, LOG_OFF, LOG_ON, MAGIC, SUPPORTED_VERSIONS, reply,
};
use sec_lsm_manager_protocol::{CodecError, Decoder, Encoder, ErrorKind, Record};

use crate::action::{self, ActionError};
use crate::backends::Backends;
use crate::context::{Context, ContextError, ContextItem, PathType};

pub use command::{Command, CommandError};
pub use log_switch::LogSwitch;

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");
pub(crate) const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No record received yet.
    AwaitingVersion,
    /// Processing commands with the negotiated version.
    Active {
        /// Protocol version in use.
        version: u32,
    },
    /// The peer violated the protocol; pending output is flushed, then the
    /// connection is closed.
    Invalid,
    /// The peer hung up or the session was torn down.
    Closed,
}

/// Transport failures that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading or writing the connection failed.
    #[error("session transport failed: {0}")]
    Transport(#[from] CodecError),
}

impl SessionError {
    /// Failure class of the underlying error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(error) => error.kind(),
        }
    }
}

/// Failure of one command, answered with `error <token>`.
#[derive(Debug, Error)]
enum Rejection {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error("record is not valid UTF-8")]
    Encoding,
}

impl Rejection {
    const fn kind(&self) -> ErrorKind {
        match self {
            Self::Command(error) => error.kind(),
            Self::Context(error) => error.kind(),
            Self::Action(error) => error.kind(),
            Self::Encoding => ErrorKind::Protocol,
        }
    }
}

/// One client connection's protocol state.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    decoder: Decoder,
    encoder: Encoder,
    context: Context,
    log: LogSwitch,
    last_activity: Instant,
}

impl Session {
    /// Creates a session awaiting its first record.
    #[must_use]
    pub fn new(log: LogSwitch, allow_empty_records: bool) -> Self {
        Self {
            state: SessionState::AwaitingVersion,
            decoder: Decoder::with_allow_empty(allow_empty_records),
            encoder: Encoder::new(),
            context: Context::new(),
            log,
            last_activity: Instant::now(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Protocol version in use once active.
    #[must_use]
    pub const fn version(&self) -> Option<u32> {
        match self.state {
            SessionState::Active { version } => Some(version),
            _ => None,
        }
    }

    /// Whether records are still accepted.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(
            self.state,
            SessionState::AwaitingVersion | SessionState::Active { .. }
        )
    }

    /// Staged application context.
    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Time of the last byte received.
    #[must_use]
    pub const fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether replies wait for the transport.
    #[must_use]
    pub const fn wants_write(&self) -> bool {
        !self.encoder.is_flushed()
    }

    /// Marks the session closed.
    pub const fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Performs one read from `reader` into the input buffer.
    ///
    /// End of stream closes the session. A read that would block is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns the transport failure.
    pub fn receive<R: Read + ?Sized>(&mut self, reader: &mut R) -> Result<(), SessionError> {
        match self.decoder.fill_from(reader) {
            Ok(0) => {
                debug!(target: SESSION_TARGET, "peer closed the connection");
                self.close();
                Ok(())
            }
            Ok(_) => {
                self.last_activity = Instant::now();
                Ok(())
            }
            Err(CodecError::WouldBlock) => Ok(()),
            // A full buffer is reported by the next decode attempt.
            Err(CodecError::MessageTooBig) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Processes every complete buffered record, writing replies to `writer`.
    ///
    /// # Errors
    ///
    /// Returns a transport failure while flushing replies.
    pub fn process<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        backends: &Backends,
    ) -> Result<(), SessionError> {
        while self.is_open() {
            let record = match self.decoder.try_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(error) => {
                    warn!(target: SESSION_TARGET, error = %error, "inbound record rejected");
                    self.send_error(writer, error.kind())?;
                    self.state = SessionState::Invalid;
                    self.flush_to(writer)?;
                    break;
                }
            };
            self.decoder.advance();
            self.handle(&record, writer, backends)?;
            self.flush_to(writer)?;
        }
        Ok(())
    }

    /// Writes pending replies to `writer`.
    ///
    /// # Errors
    ///
    /// Returns the transport failure; a writer that would block is not an
    /// error.
    pub fn flush_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), SessionError> {
        match self.encoder.flush_to(writer) {
            Ok(_) | Err(CodecError::WouldBlock) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn handle<W: Write + ?Sized>(
        &mut self,
        record: &Record,
        writer: &mut W,
        backends: &Backends,
    ) -> Result<(), SessionError> {
        let Ok(fields) = record.to_strs() else {
            return self.reject(writer, &Rejection::Encoding);
        };
        if self.log.is_enabled() {
            info!(target: PROTOCOL_TARGET, direction = "in", record = %fields.join(" "));
        }

        if self.state == SessionState::AwaitingVersion {
            if fields.first() == Some(&MAGIC) {
                return self.negotiate(writer, &fields);
            }
            self.state = SessionState::Active {
                version: DEFAULT_VERSION,
            };
        }

        if fields.is_empty() {
            return self.send(writer, &[reply::DONE]);
        }

        match Command::parse(&fields) {
            Ok(command) => self.dispatch(command, writer, backends),
            Err(error) => self.reject(writer, &error.into()),
        }
    }

    fn negotiate<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        fields: &[&str],
    ) -> Result<(), SessionError> {
        let version = fields
            .iter()
            .skip(1)
            .filter_map(|field| field.parse::<u32>().ok())
            .find(|version| SUPPORTED_VERSIONS.contains(version));
        match version {
            Some(version) => {
                self.state = SessionState::Active { version };
                debug!(target: SESSION_TARGET, version, "protocol negotiated");
                self.send(writer, &[reply::DONE, &version.to_string()])
            }
            None => {
                warn!(target: SESSION_TARGET, offered = ?fields, "no supported protocol version");
                self.send_error(writer, ErrorKind::Protocol)?;
                self.state = SessionState::Invalid;
                Ok(())
            }
        }
    }

    fn dispatch<W: Write + ?Sized>(
        &mut self,
        command: Command<'_>,
        writer: &mut W,
        backends: &Backends,
    ) -> Result<(), SessionError> {
        let outcome: Result<(), Rejection> = match command {
            Command::Clear => {
                self.context.clear();
                Ok(())
            }
            Command::Display => return self.display(writer),
            Command::Log(switch) => return self.log_switch(writer, switch),
            Command::Id(id) => self.context.set_id(id).map_err(Rejection::from),
            Command::Path { path, kind } => kind
                .parse::<PathType>()
                .map_err(|_| ContextError::UnknownPathType(kind.to_owned()))
                .and_then(|kind| self.context.add_path(path, kind))
                .map_err(Rejection::from),
            Command::Permission(permission) => self
                .context
                .add_permission(permission)
                .map_err(Rejection::from),
            Command::Plug {
                export_dir,
                import_id,
                import_dir,
            } => self
                .context
                .add_plug(export_dir, import_id, import_dir)
                .map_err(Rejection::from),
            Command::Install => action::install(
                &self.context,
                backends.permissions.as_ref(),
                backends.mac.as_ref(),
            )
            .map_err(Rejection::from),
            Command::Uninstall => action::uninstall(
                &self.context,
                backends.permissions.as_ref(),
                backends.mac.as_ref(),
            )
            .map_err(Rejection::from),
        };
        match outcome {
            Ok(()) => self.send(writer, &[reply::DONE]),
            Err(rejection) => self.reject(writer, &rejection),
        }
    }

    fn display<W: Write + ?Sized>(&mut self, writer: &mut W) -> Result<(), SessionError> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        if self.context.has_error() {
            rows.push(vec!["error".to_owned(), LOG_ON.to_owned()]);
        }
        let flow = self.context.visit(|item| {
            rows.push(match item {
                ContextItem::Id(id) => vec!["id".to_owned(), id.to_owned()],
                ContextItem::Path(path) => vec![
                    "path".to_owned(),
                    path.path.to_string(),
                    path.kind.as_str().to_owned(),
                ],
                ContextItem::Permission(permission) => {
                    vec!["permission".to_owned(), permission.to_owned()]
                }
                ContextItem::Plug(plug) => vec![
                    "plug".to_owned(),
                    plug.export_dir.to_string(),
                    plug.import_id.clone(),
                    plug.import_dir.to_string(),
                ],
            });
            ControlFlow::<()>::Continue(())
        });
        debug_assert!(flow.is_continue());
        for row in rows {
            let fields: Vec<&str> = std::iter::once(reply::STRING)
                .chain(row.iter().map(String::as_str))
                .collect();
            if !self.try_send(writer, &fields)? {
                warn!(target: SESSION_TARGET, "display row does not fit the reply buffer");
                return self.send_error(writer, ErrorKind::BufferFull);
            }
        }
        self.send(writer, &[reply::DONE])
    }

    fn log_switch<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        switch: Option<bool>,
    ) -> Result<(), SessionError> {
        if let Some(enabled) = switch {
            self.log.set(enabled);
            info!(target: SESSION_TARGET, enabled, "protocol logging switched");
        }
        let state = if self.log.is_enabled() { LOG_ON } else { LOG_OFF };
        self.send(writer, &[reply::DONE, state])
    }

    fn reject<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        rejection: &Rejection,
    ) -> Result<(), SessionError> {
        let kind = rejection.kind();
        match kind {
            ErrorKind::Protocol => {
                warn!(target: SESSION_TARGET, error = %rejection, "protocol violation");
                self.send_error(writer, kind)?;
                self.state = SessionState::Invalid;
                return Ok(());
            }
            ErrorKind::Internal => {
                warn!(
                    target: SESSION_TARGET,
                    error = %rejection,
                    "command failed; context flagged"
                );
                self.context.raise_error();
            }
            _ => debug!(target: SESSION_TARGET, error = %rejection, "command rejected"),
        }
        self.send_error(writer, kind)
    }

    fn send_error<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        kind: ErrorKind,
    ) -> Result<(), SessionError> {
        self.send(writer, &[reply::ERROR, kind.token()])
    }

    /// Encodes one reply. An overflow invalidates the session.
    fn send<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        fields: &[&str],
    ) -> Result<(), SessionError> {
        if !self.try_send(writer, fields)? {
            warn!(target: SESSION_TARGET, "reply does not fit; closing");
            self.state = SessionState::Invalid;
        }
        Ok(())
    }

    /// Encodes one reply, flushing and retrying once when the output buffer
    /// is full. Returns `false` when the second attempt overflows too.
    fn try_send<W: Write + ?Sized>(
        &mut self,
        writer: &mut W,
        fields: &[&str],
    ) -> Result<bool, SessionError> {
        if self.encoder.write_record(fields).is_err() {
            self.flush_to(writer)?;
            if let Err(error) = self.encoder.write_record(fields) {
                debug!(target: SESSION_TARGET, error = %error, "reply overflow");
                return Ok(false);
            }
        }
        if self.log.is_enabled() {
            info!(target: PROTOCOL_TARGET, direction = "out", record = %fields.join(" "));
        }
        Ok(true)
    }
}
