//! Single-threaded connection multiplexer.
//!
//! The [`Server`] waits with `poll(2)` on the listening socket and on every
//! client connection. Each readable client has its bytes fed to its
//! [`Session`], which answers every complete record before the next wait.
//! The listener leaves the readiness set while the pool is full.

mod connection;
mod errors;
mod listener;

use std::os::fd::AsFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, info, warn};

use crate::backends::Backends;
use crate::session::{LogSwitch, Session, SessionState};

pub use connection::ConnectionStream;
pub use errors::ListenerError;
pub use listener::SocketListener;

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Tunables of the serve loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Maximum number of concurrent sessions; at least one.
    pub max_clients: usize,
    /// Disconnect sessions silent for this long; `None` never does.
    pub idle_timeout: Option<Duration>,
    /// Surface bare record separators to sessions as empty records.
    pub allow_empty_records: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_clients: 3,
            idle_timeout: None,
            allow_empty_records: false,
        }
    }
}

/// Why [`Server::serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The idle timeout elapsed with no session left.
    Idle,
    /// The shutdown flag was raised.
    Shutdown,
}

struct Client {
    stream: ConnectionStream,
    session: Session,
}

/// Owns the listener, the session pool and the backends.
pub struct Server {
    listener: SocketListener,
    clients: Vec<Client>,
    backends: Backends,
    options: ServerOptions,
    log: LogSwitch,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    /// Creates a server over a bound listener.
    #[must_use]
    pub fn new(listener: SocketListener, backends: Backends, options: ServerOptions) -> Self {
        Self {
            listener,
            clients: Vec::new(),
            backends,
            options: ServerOptions {
                max_clients: options.max_clients.max(1),
                ..options
            },
            log: LogSwitch::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the loop once `flag` is raised.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Protocol logging switch shared by all sessions.
    #[must_use]
    pub fn log_switch(&self) -> LogSwitch {
        self.log.clone()
    }

    /// Bound listener.
    #[must_use]
    pub const fn listener(&self) -> &SocketListener {
        &self.listener
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.clients.len()
    }

    /// Runs until shutdown or idle expiry, then removes the unix socket.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Poll`] when waiting for readiness fails.
    pub fn serve(&mut self) -> Result<StopReason, ListenerError> {
        info!(
            target: SERVER_TARGET,
            endpoint = %self.listener.endpoint(),
            max_clients = self.options.max_clients,
            idle_timeout_secs = self.options.idle_timeout.map(|timeout| timeout.as_secs()),
            "server listening"
        );
        let outcome = self.run();
        for client in self.clients.drain(..) {
            client.stream.close();
        }
        self.listener.cleanup();
        if let Ok(reason) = &outcome {
            info!(target: SERVER_TARGET, ?reason, "server stopped");
        }
        outcome
    }

    fn run(&mut self) -> Result<StopReason, ListenerError> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(StopReason::Shutdown);
            }
            let accepting = self.clients.len() < self.options.max_clients;
            let Some((ready, listener_ready, client_events)) = self.wait(accepting)? else {
                continue;
            };
            if listener_ready {
                self.accept_pending();
            }
            self.service(&client_events);
            self.reap(Instant::now());
            if ready == 0 && self.clients.is_empty() && self.options.idle_timeout.is_some() {
                return Ok(StopReason::Idle);
            }
        }
    }

    /// Waits for readiness. `None` means the wait was interrupted.
    fn wait(
        &self,
        accepting: bool,
    ) -> Result<Option<(i32, bool, Vec<PollFlags>)>, ListenerError> {
        let mut fds = Vec::with_capacity(self.clients.len() + 1);
        if accepting {
            fds.push(PollFd::new(self.listener.as_fd(), PollFlags::POLLIN));
        }
        for client in &self.clients {
            let mut events = PollFlags::POLLIN;
            if client.session.wants_write() {
                events |= PollFlags::POLLOUT;
            }
            fds.push(PollFd::new(client.stream.as_fd(), events));
        }
        let timeout = self
            .options
            .idle_timeout
            .map_or(PollTimeout::NONE, |timeout| {
                PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX)
            });
        let ready = match poll(&mut fds, timeout) {
            Ok(ready) => ready,
            Err(Errno::EINTR) => return Ok(None),
            Err(errno) => return Err(ListenerError::Poll(errno)),
        };
        let mut revents = fds
            .iter()
            .map(|fd| fd.revents().unwrap_or_else(PollFlags::empty));
        let listener_ready = accepting
            && revents
                .next()
                .is_some_and(|flags| flags.intersects(PollFlags::POLLIN));
        Ok(Some((ready, listener_ready, revents.collect())))
    }

    fn accept_pending(&mut self) {
        while self.clients.len() < self.options.max_clients {
            match self.listener.accept() {
                Ok(Some(stream)) => {
                    self.clients.push(Client {
                        stream,
                        session: Session::new(self.log.clone(), self.options.allow_empty_records),
                    });
                    debug!(
                        target: SERVER_TARGET,
                        sessions = self.clients.len(),
                        "client connected"
                    );
                }
                Ok(None) => break,
                Err(error) => {
                    warn!(target: SERVER_TARGET, error = %error, "failed to accept client");
                    break;
                }
            }
        }
    }

    fn service(&mut self, events: &[PollFlags]) {
        let backends = &self.backends;
        for (client, flags) in self.clients.iter_mut().zip(events) {
            let Client { stream, session } = client;
            if flags.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR) {
                let result = session
                    .receive(stream)
                    .and_then(|()| session.process(stream, backends));
                if let Err(error) = result {
                    warn!(target: SERVER_TARGET, error = %error, "client transport failed");
                    session.close();
                    continue;
                }
            }
            if flags.contains(PollFlags::POLLOUT)
                && let Err(error) = session.flush_to(stream)
            {
                warn!(target: SERVER_TARGET, error = %error, "failed to write to client");
                session.close();
            }
        }
    }

    /// Drops closed, invalid and idle sessions.
    fn reap(&mut self, now: Instant) {
        let idle_timeout = self.options.idle_timeout;
        self.clients.retain_mut(|client| {
            let idle = idle_timeout.is_some_and(|timeout| {
                now.saturating_duration_since(client.session.last_activity()) >= timeout
            });
            if client.session.is_open() && !idle {
                return true;
            }
            if client.session.state() == SessionState::Invalid
                && let Err(error) = client.session.flush_to(&mut client.stream)
            {
                debug!(target: SERVER_TARGET, error = %error, "final flush failed");
            }
            if idle {
                info!(target: SERVER_TARGET, "disconnecting idle client");
            }
            client.stream.close();
            false
        });
    }
}
