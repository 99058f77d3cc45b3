//! Runs the daemon on a background thread against a temporary socket.

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use sec_lsm_manager_config::Config;
use tempfile::TempDir;

use crate::bootstrap::StaticConfigLoader;
use crate::process::launch::run_daemon_with;
use crate::server::StopReason;

use super::{RecordingHealthReporter, test_config};

const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle on a daemon serving from a background thread.
pub struct DaemonHarness {
    root: TempDir,
    socket: Utf8PathBuf,
    reporter: Arc<RecordingHealthReporter>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<StopReason, String>>>,
}

impl DaemonHarness {
    /// Starts a daemon whose sessions expire after `idle_timeout` seconds.
    #[must_use]
    pub fn start(idle_timeout: u64) -> Self {
        let root = TempDir::new().expect("temporary directory");
        let base = Utf8PathBuf::from_path_buf(root.path().to_path_buf()).expect("utf8 path");
        let config = Config {
            idle_timeout,
            ..test_config(&base)
        };
        let socket = config
            .socket()
            .unix_path()
            .expect("unix socket")
            .to_path_buf();
        let reporter = Arc::new(RecordingHealthReporter::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let reporter = Arc::clone(&reporter);
            let shutdown = Arc::clone(&shutdown);
            let loader = StaticConfigLoader::new(config);
            thread::spawn(move || {
                run_daemon_with(&loader, reporter, shutdown).map_err(|error| error.to_string())
            })
        };
        Self {
            root,
            socket,
            reporter,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Path of the daemon socket.
    #[must_use]
    pub const fn socket(&self) -> &Utf8PathBuf {
        &self.socket
    }

    /// Root of the temporary tree, usable for application paths.
    #[must_use]
    pub fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.root.path().to_path_buf()).expect("utf8 path")
    }

    /// Reporter observing the daemon.
    #[must_use]
    pub fn reporter(&self) -> &RecordingHealthReporter {
        &self.reporter
    }

    /// Connects once the daemon accepts connections.
    #[must_use]
    pub fn connect(&self) -> UnixStream {
        let deadline = Instant::now() + START_TIMEOUT;
        loop {
            match UnixStream::connect(&self.socket) {
                Ok(stream) => return stream,
                Err(error) if Instant::now() >= deadline => {
                    panic!("daemon did not accept connections: {error}")
                }
                Err(_) => thread::sleep(Duration::from_millis(10)),
            }
        }
    }

    /// Raises the shutdown flag and wakes the serve loop with a connection.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        drop(UnixStream::connect(&self.socket));
    }

    /// Waits for the daemon thread and returns its outcome.
    pub fn join(&mut self) -> Result<StopReason, String> {
        let handle = self.handle.take().ok_or("daemon already joined")?;
        handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?
    }
}

impl Drop for DaemonHarness {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_shutdown();
            drop(self.join());
        }
    }
}
