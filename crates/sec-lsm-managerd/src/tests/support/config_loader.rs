//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoError;
use tempfile::TempDir;

use sec_lsm_manager_config::{
    Config, LogFormat, MacBackendKind, PermissionBackendKind, SocketEndpoint,
};

use crate::bootstrap::ConfigLoader;

/// Configuration confined to `root`, with host-neutral backends.
#[must_use]
pub fn test_config(root: &Utf8Path) -> Config {
    Config {
        socket: SocketEndpoint::unix(root.join("run").join("sec-lsm-manager.socket")),
        log_filter: "warn".to_owned(),
        log_format: LogFormat::Compact,
        mac_backend: MacBackendKind::Simulate,
        permission_backend: PermissionBackendKind::Memory,
        policy_dir: root.join("policy"),
        ..Config::default()
    }
}

/// Loader that provisions the socket and policy paths under a temporary
/// directory.
pub struct TestConfigLoader {
    root: TempDir,
    max_clients: usize,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("failed to create temporary directory"),
            max_clients: 3,
        }
    }

    /// Overrides the session pool capacity.
    pub fn set_max_clients(&mut self, max_clients: usize) {
        self.max_clients = max_clients;
    }

    /// Root of the temporary tree.
    #[must_use]
    pub fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.root.path().to_path_buf())
            .expect("temporary directory path was not valid UTF-8")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            max_clients: self.max_clients,
            ..test_config(&self.root())
        })
    }
}

/// Loader that intentionally fails by passing an invalid socket argument.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("sec-lsm-managerd"),
            OsString::from("--socket"),
            OsString::from("carrier-pigeon://socket"),
        ];
        Config::load_from_iter(args)
    }
}
