//! Client of a cynagora permission service.
//!
//! Cynagora speaks the same line codec as the daemon itself. The admin
//! connection is opened on first use and discarded after any transport
//! failure so that the next call reconnects.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;

use tracing::{debug, warn};

use sec_lsm_manager_config::SocketEndpoint;
use sec_lsm_manager_protocol::{Decoder, Encoder};

use super::PermissionBackend;
use crate::backends::{BACKEND_TARGET, BackendError};
use crate::server::ConnectionStream;

const MAGIC: &str = "cynagora";
const VERSION: &str = "1";
const ANY: &str = "*";
const GRANT: &str = "yes";

/// Permission backend backed by the cynagora admin socket.
pub struct CynagoraPermissions {
    endpoint: SocketEndpoint,
    connection: RefCell<Option<Connection>>,
    next_check: Cell<u64>,
}

impl CynagoraPermissions {
    /// Creates a client for `endpoint`; nothing is opened yet.
    #[must_use]
    pub const fn new(endpoint: SocketEndpoint) -> Self {
        Self {
            endpoint,
            connection: RefCell::new(None),
            next_check: Cell::new(0),
        }
    }

    fn with_connection<T>(
        &self,
        operation: impl FnOnce(&mut Connection) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut slot = self.connection.borrow_mut();
        let connection = match slot.take() {
            Some(connection) => slot.insert(connection),
            None => slot.insert(Connection::open(&self.endpoint)?),
        };
        let result = operation(connection);
        if let Err(
            BackendError::Transport(_) | BackendError::Closed | BackendError::Connect { .. },
        ) = &result
        {
            debug!(
                target: BACKEND_TARGET,
                endpoint = %self.endpoint,
                "dropping cynagora connection"
            );
            *slot = None;
        }
        result
    }
}

impl PermissionBackend for CynagoraPermissions {
    fn name(&self) -> &'static str {
        "cynagora"
    }

    fn check_permission(&self, label: &str, permission: &str) -> Result<bool, BackendError> {
        let serial = self.next_check.get();
        self.next_check.set(serial.wrapping_add(1));
        let serial = serial.to_string();
        self.with_connection(|connection| {
            let reply = connection.request(&["check", &serial, label, ANY, ANY, permission])?;
            match reply.first().map(String::as_str) {
                Some("yes") => Ok(true),
                Some("no") => Ok(false),
                _ => Err(unexpected("check", &reply)),
            }
        })
    }

    fn add_permissions(
        &self,
        label: &str,
        permissions: &BTreeSet<String>,
        drop_before: bool,
    ) -> Result<(), BackendError> {
        self.with_connection(|connection| {
            connection.transaction(|connection| {
                if drop_before {
                    connection.expect_done("drop", &["drop", label, ANY, ANY, ANY])?;
                }
                for permission in permissions {
                    connection
                        .expect_done("set", &["set", label, ANY, ANY, permission, GRANT])?;
                }
                Ok(())
            })
        })
    }

    fn drop_permissions(&self, label: &str) -> Result<(), BackendError> {
        self.with_connection(|connection| {
            connection.transaction(|connection| {
                connection.expect_done("drop", &["drop", label, ANY, ANY, ANY])
            })
        })
    }
}

struct Connection {
    stream: ConnectionStream,
    encoder: Encoder,
    decoder: Decoder,
}

impl Connection {
    fn open(endpoint: &SocketEndpoint) -> Result<Self, BackendError> {
        let stream = ConnectionStream::connect(endpoint).map_err(|source| BackendError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let mut connection = Self {
            stream,
            encoder: Encoder::new(),
            decoder: Decoder::new(),
        };
        let reply = connection.request(&[MAGIC, VERSION])?;
        if reply.first().map(String::as_str) != Some("done") {
            return Err(unexpected(MAGIC, &reply));
        }
        debug!(
            target: BACKEND_TARGET,
            endpoint = %endpoint,
            "cynagora connection established"
        );
        Ok(connection)
    }

    fn transaction(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), BackendError>,
    ) -> Result<(), BackendError> {
        self.expect_done("enter", &["enter"])?;
        match body(self) {
            Ok(()) => self.expect_done("leave", &["leave", "commit"]),
            Err(error) => {
                if let Err(abort) = self.expect_done("leave", &["leave", "abort"]) {
                    warn!(
                        target: BACKEND_TARGET,
                        error = %abort,
                        "failed to abort cynagora transaction"
                    );
                }
                Err(error)
            }
        }
    }

    fn expect_done(&mut self, request: &'static str, fields: &[&str]) -> Result<(), BackendError> {
        let reply = self.request(fields)?;
        if reply.first().map(String::as_str) == Some("done") {
            Ok(())
        } else {
            Err(unexpected(request, &reply))
        }
    }

    fn request(&mut self, fields: &[&str]) -> Result<Vec<String>, BackendError> {
        self.encoder.write_record(fields)?;
        self.encoder.flush_to(&mut self.stream)?;
        loop {
            if let Some(record) = self.decoder.try_record()? {
                self.decoder.advance();
                let reply: Vec<String> = record
                    .fields()
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect();
                // Cache invalidation notices may arrive between replies.
                if reply.first().map(String::as_str) == Some("clear") {
                    continue;
                }
                return Ok(reply);
            }
            if self.decoder.fill_from(&mut self.stream)? == 0 {
                return Err(BackendError::Closed);
            }
        }
    }
}

fn unexpected(request: &'static str, reply: &[String]) -> BackendError {
    BackendError::UnexpectedReply {
        request,
        reply: reply.join(" "),
    }
}
