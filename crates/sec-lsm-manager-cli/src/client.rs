//! Synchronous client of the sec-lsm-manager daemon.

use sec_lsm_manager_config::SocketEndpoint;
use sec_lsm_manager_protocol::wire::{DEFAULT_VERSION, LOG_OFF, LOG_ON, MAGIC, command, reply};
use sec_lsm_manager_protocol::{CodecError, Decoder, Encoder};

use crate::ClientError;
use crate::transport::{self, Connection};

/// Terminal record of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// `done`, with its trailing fields.
    Done(Vec<String>),
    /// `error`, with its token.
    Error(String),
}

/// Everything the daemon sent back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Fields of each `string` record, without the leading word.
    pub rows: Vec<Vec<String>>,
    /// Terminal record.
    pub status: Status,
}

impl Reply {
    /// Reply records as wire lines, terminal record last.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let terminal = match &self.status {
            Status::Done(fields) => join(reply::DONE, fields),
            Status::Error(token) => format!("{} {token}", reply::ERROR),
        };
        self.rows
            .iter()
            .map(|row| join(reply::STRING, row))
            .chain(std::iter::once(terminal))
            .collect()
    }

    fn into_done(self, command: &str) -> Result<(Vec<Vec<String>>, Vec<String>), ClientError> {
        match self.status {
            Status::Done(fields) => Ok((self.rows, fields)),
            Status::Error(token) => Err(ClientError::Refused {
                command: command.to_owned(),
                token,
            }),
        }
    }
}

fn join(word: &str, fields: &[String]) -> String {
    std::iter::once(word)
        .chain(fields.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Connection to the daemon with a negotiated protocol version.
#[derive(Debug)]
pub struct Client {
    connection: Connection,
    encoder: Encoder,
    decoder: Decoder,
    version: u32,
}

impl Client {
    /// Connects to `endpoint` and negotiates the protocol version.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the connection or the handshake fails.
    pub fn connect(endpoint: &SocketEndpoint) -> Result<Self, ClientError> {
        let mut client = Self {
            connection: transport::connect(endpoint)?,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
            version: DEFAULT_VERSION,
        };
        client.handshake()?;
        Ok(client)
    }

    /// Protocol version agreed with the daemon.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    fn handshake(&mut self) -> Result<(), ClientError> {
        let offer = DEFAULT_VERSION.to_string();
        let (_, fields) = self.raw(&[MAGIC, offer.as_str()])?.into_done(MAGIC)?;
        self.version = fields
            .first()
            .and_then(|version| version.parse().ok())
            .ok_or_else(|| ClientError::UnexpectedReply(join(reply::DONE, &fields)))?;
        Ok(())
    }

    /// Resets the staged application.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn clear(&mut self) -> Result<(), ClientError> {
        self.expect_done(&[command::CLEAR])
    }

    /// Sets the application identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn set_id(&mut self, id: &str) -> Result<(), ClientError> {
        self.expect_done(&[command::ID, id])
    }

    /// Adds `path` with the given path type.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn add_path(&mut self, path: &str, kind: &str) -> Result<(), ClientError> {
        self.expect_done(&[command::PATH, path, kind])
    }

    /// Adds a permission.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn add_permission(&mut self, permission: &str) -> Result<(), ClientError> {
        self.expect_done(&[command::PERMISSION, permission])
    }

    /// Exports `export_dir` into `import_dir` of application `import_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn add_plug(
        &mut self,
        export_dir: &str,
        import_id: &str,
        import_dir: &str,
    ) -> Result<(), ClientError> {
        self.expect_done(&[command::PLUG, export_dir, import_id, import_dir])
    }

    /// Installs the staged application.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn install(&mut self) -> Result<(), ClientError> {
        self.expect_done(&[command::INSTALL])
    }

    /// Removes the staged application.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn uninstall(&mut self) -> Result<(), ClientError> {
        self.expect_done(&[command::UNINSTALL])
    }

    /// Lists the staged application, one row per `string` record.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails or is refused.
    pub fn display(&mut self) -> Result<Vec<Vec<String>>, ClientError> {
        self.raw(&[command::DISPLAY])?
            .into_done(command::DISPLAY)
            .map(|(rows, _)| rows)
    }

    /// Queries protocol logging, switching it first when `switch` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request fails, is refused or the
    /// reply carries no state.
    pub fn log(&mut self, switch: Option<bool>) -> Result<bool, ClientError> {
        let reply = match switch {
            Some(true) => self.raw(&[command::LOG, LOG_ON])?,
            Some(false) => self.raw(&[command::LOG, LOG_OFF])?,
            None => self.raw(&[command::LOG])?,
        };
        let (_, fields) = reply.into_done(command::LOG)?;
        match fields.first().map(String::as_str) {
            Some(LOG_ON) => Ok(true),
            Some(LOG_OFF) => Ok(false),
            _ => Err(ClientError::UnexpectedReply(join(reply::DONE, &fields))),
        }
    }

    /// Sends `fields` as one record and collects the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport failure or when the daemon
    /// answers outside the reply vocabulary. Refusals are returned as
    /// [`Status::Error`].
    pub fn raw(&mut self, fields: &[&str]) -> Result<Reply, ClientError> {
        self.send(fields)?;
        let mut rows = Vec::new();
        loop {
            let mut record = self.receive()?.into_iter();
            let word = record.next().unwrap_or_default();
            let rest: Vec<String> = record.collect();
            match word.as_str() {
                reply::STRING => rows.push(rest),
                reply::DONE => {
                    return Ok(Reply {
                        rows,
                        status: Status::Done(rest),
                    });
                }
                reply::ERROR => {
                    return Ok(Reply {
                        rows,
                        status: Status::Error(rest.into_iter().next().unwrap_or_default()),
                    });
                }
                _ => return Err(ClientError::UnexpectedReply(join(&word, &rest))),
            }
        }
    }

    fn expect_done(&mut self, fields: &[&str]) -> Result<(), ClientError> {
        let command = fields.first().copied().unwrap_or_default();
        self.raw(fields)?.into_done(command).map(drop)
    }

    fn send(&mut self, fields: &[&str]) -> Result<(), ClientError> {
        self.encoder
            .write_record(fields)
            .map_err(ClientError::Send)?;
        while !self.encoder.is_flushed() {
            match self.encoder.flush_to(&mut self.connection) {
                Ok(_) => {}
                Err(CodecError::WouldBlock) => transport::wait_writable(&self.connection)
                    .map_err(|error| ClientError::Send(CodecError::Io(error)))?,
                Err(error) => return Err(ClientError::Send(error)),
            }
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<String>, ClientError> {
        loop {
            if let Some(record) = self.decoder.try_record().map_err(ClientError::Receive)? {
                self.decoder.advance();
                return Ok(record
                    .fields()
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect());
            }
            match self.decoder.fill_from(&mut self.connection) {
                Ok(0) => return Err(ClientError::Closed),
                Ok(_) => {}
                Err(error) => return Err(ClientError::Receive(error)),
            }
        }
    }
}
