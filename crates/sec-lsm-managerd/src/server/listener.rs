//! Non-blocking listening socket.

use std::fs;
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use tracing::warn;

use sec_lsm_manager_config::SocketEndpoint;

use super::{ConnectionStream, ListenerError, SERVER_TARGET};

/// Listener bound to a socket endpoint.
#[derive(Debug)]
pub struct SocketListener {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl SocketListener {
    /// Binds `endpoint` in non-blocking mode.
    ///
    /// A unix socket file left behind by a dead process is replaced; a live
    /// socket or a non-socket file is refused.
    ///
    /// # Errors
    ///
    /// Returns a [`ListenerError`] describing the bind failure.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let listener = match endpoint {
            SocketEndpoint::Tcp { host, port } => ListenerKind::Tcp(bind_tcp(host, *port)?),
            SocketEndpoint::Unix { path } => ListenerKind::Unix(bind_unix(path.as_std_path())?),
        };
        let bound = Self {
            endpoint: endpoint.clone(),
            listener,
        };
        let nonblocking = match &bound.listener {
            ListenerKind::Tcp(listener) => listener.set_nonblocking(true),
            ListenerKind::Unix(listener) => listener.set_nonblocking(true),
        };
        if let Err(source) = nonblocking {
            bound.cleanup();
            return Err(ListenerError::NonBlocking { source });
        }
        Ok(bound)
    }

    /// Endpoint the listener was bound to.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Address of a TCP listener, useful when bound to port zero.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            ListenerKind::Unix(_) => None,
        }
    }

    /// Accepts one pending connection, switched to non-blocking mode.
    ///
    /// Returns `Ok(None)` when no connection is waiting.
    ///
    /// # Errors
    ///
    /// Returns the accept failure.
    pub fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match &self.listener {
            ListenerKind::Tcp(tcp) => tcp.accept().map(|(stream, _)| ConnectionStream::Tcp(stream)),
            ListenerKind::Unix(unix) => unix
                .accept()
                .map(|(stream, _)| ConnectionStream::Unix(stream)),
        };
        match accepted {
            Ok(stream) => {
                stream.set_nonblocking(true)?;
                Ok(Some(stream))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Removes the unix socket file, if any.
    pub fn cleanup(&self) {
        let SocketEndpoint::Unix { path } = &self.endpoint else {
            return;
        };
        if let Err(error) = fs::remove_file(path.as_std_path())
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: SERVER_TARGET,
                error = %error,
                path = %path,
                "failed to remove unix socket file"
            );
        }
    }
}

impl AsFd for SocketListener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.as_fd(),
            ListenerKind::Unix(listener) => listener.as_fd(),
        }
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.file_type().is_socket() => {
            return Err(ListenerError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        Ok(_) => match UnixStream::connect(path) {
            Ok(_live) => {
                return Err(ListenerError::UnixInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(source) => {
                return Err(ListenerError::UnixConnect {
                    path: path.display().to_string(),
                    source,
                });
            }
        },
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            });
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;

    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    use super::*;

    fn unix_endpoint(dir: &TempDir) -> (Utf8PathBuf, SocketEndpoint) {
        let path =
            Utf8PathBuf::from_path_buf(dir.path().join("manager.socket")).expect("utf8 path");
        let endpoint = SocketEndpoint::unix(path.clone());
        (path, endpoint)
    }

    #[test]
    fn accept_without_pending_connection_returns_none() {
        let listener = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind");
        assert!(listener.accept().expect("accept").is_none());
    }

    #[test]
    fn tcp_listener_accepts_connections() {
        let listener = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let _client = TcpStream::connect(addr).expect("connect");

        let mut accepted = None;
        for _ in 0..100 {
            accepted = listener.accept().expect("accept");
            if accepted.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(accepted.is_some(), "expected a pending connection");
    }

    #[test]
    fn unix_listener_replaces_stale_socket_file() {
        let dir = TempDir::new().expect("temp dir");
        let (path, endpoint) = unix_endpoint(&dir);
        drop(UnixListener::bind(&path).expect("bind stale listener"));
        assert!(path.exists(), "stale socket should remain");

        let listener = SocketListener::bind(&endpoint).expect("bind over stale socket");
        UnixStream::connect(&path).expect("connect unix client");

        listener.cleanup();
        assert!(!path.exists(), "cleanup removes the socket file");
    }

    #[test]
    fn unix_listener_rejects_live_socket() {
        let dir = TempDir::new().expect("temp dir");
        let (path, endpoint) = unix_endpoint(&dir);
        let _existing = UnixListener::bind(&path).expect("bind existing listener");

        let error = SocketListener::bind(&endpoint).expect_err("socket in use");
        assert!(matches!(error, ListenerError::UnixInUse { .. }));
    }

    #[test]
    fn unix_listener_rejects_regular_file() {
        let dir = TempDir::new().expect("temp dir");
        let (path, endpoint) = unix_endpoint(&dir);
        fs::write(&path, b"not a socket").expect("write file");

        let error = SocketListener::bind(&endpoint).expect_err("not a socket");
        assert!(matches!(error, ListenerError::UnixNotSocket { .. }));
    }
}
