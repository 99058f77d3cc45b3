//! Parsing of client records into commands.

use thiserror::Error;

use sec_lsm_manager_protocol::ErrorKind;
use sec_lsm_manager_protocol::wire::{LOG_OFF, LOG_ON, command};

/// One client request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Reset the context.
    Clear,
    /// Stream the context back.
    Display,
    /// Set the application id.
    Id(&'a str),
    /// Commit the context.
    Install,
    /// Query (`None`) or switch protocol logging.
    Log(Option<bool>),
    /// Add a labelled path; the type is validated by the context.
    Path {
        /// Filesystem path.
        path: &'a str,
        /// Path type word.
        kind: &'a str,
    },
    /// Add a permission.
    Permission(&'a str),
    /// Add a plug.
    Plug {
        /// Exported directory.
        export_dir: &'a str,
        /// Importing application.
        import_id: &'a str,
        /// Directory receiving the export.
        import_dir: &'a str,
    },
    /// Retract the context.
    Uninstall,
}

/// A record that is not a well-formed command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The record has no fields.
    #[error("empty command")]
    Empty,
    /// The first field is not a known command.
    #[error("unknown command '{0}'")]
    Unknown(String),
    /// The command got the wrong number of arguments.
    #[error("'{command}' takes {expected} argument(s), got {found}")]
    Arity {
        /// Command word.
        command: String,
        /// Accepted argument count.
        expected: &'static str,
        /// Received argument count.
        found: usize,
    },
    /// `log` got something other than `on` or `off`.
    #[error("invalid log switch '{0}'")]
    LogSwitch(String),
}

impl CommandError {
    /// Failure class reported to clients.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Protocol
    }
}

impl<'a> Command<'a> {
    /// Parses the fields of one record.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for an unknown word or a wrong arity.
    pub fn parse(fields: &[&'a str]) -> Result<Self, CommandError> {
        let (&word, args) = fields.split_first().ok_or(CommandError::Empty)?;
        match (word, args) {
            (command::CLEAR, []) => Ok(Self::Clear),
            (command::DISPLAY, []) => Ok(Self::Display),
            (command::ID, &[id]) => Ok(Self::Id(id)),
            (command::INSTALL, []) => Ok(Self::Install),
            (command::LOG, []) => Ok(Self::Log(None)),
            (command::LOG, &[LOG_ON]) => Ok(Self::Log(Some(true))),
            (command::LOG, &[LOG_OFF]) => Ok(Self::Log(Some(false))),
            (command::LOG, &[other]) => Err(CommandError::LogSwitch(other.to_owned())),
            (command::PATH, &[path, kind]) => Ok(Self::Path { path, kind }),
            (command::PERMISSION, &[permission]) => Ok(Self::Permission(permission)),
            (command::PLUG, &[export_dir, import_id, import_dir]) => Ok(Self::Plug {
                export_dir,
                import_id,
                import_dir,
            }),
            (command::UNINSTALL, []) => Ok(Self::Uninstall),
            (command::CLEAR | command::DISPLAY | command::INSTALL | command::UNINSTALL, _) => {
                Err(arity(word, "0", args))
            }
            (command::ID | command::PERMISSION, _) => Err(arity(word, "1", args)),
            (command::LOG, _) => Err(arity(word, "0 or 1", args)),
            (command::PATH, _) => Err(arity(word, "2", args)),
            (command::PLUG, _) => Err(arity(word, "3", args)),
            _ => Err(CommandError::Unknown(word.to_owned())),
        }
    }
}

fn arity(word: &str, expected: &'static str, args: &[&str]) -> CommandError {
    CommandError::Arity {
        command: word.to_owned(),
        expected,
        found: args.len(),
    }
}
