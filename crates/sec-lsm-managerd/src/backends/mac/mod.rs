//! Mandatory access control backends.
//!
//! The implementation is chosen at runtime: SMACK and SELinux write and load
//! real policy, while the simulator only records what it was asked to do.

pub mod selinux;
mod simulate;
pub mod smack;

use camino::Utf8Path;

use sec_lsm_manager_config::MacBackendKind;

use super::BackendError;
use crate::context::Context;

pub use selinux::SelinuxMac;
pub use simulate::SimulateMac;
pub use smack::SmackMac;

/// Installs and removes the MAC policy of an application.
pub trait MacBackend {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Security label of application `app_id`.
    fn derive_label(&self, app_id: &str) -> String;

    /// Installs the policy and path labels described by `context`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when a file or tool fails.
    fn install(&self, context: &Context) -> Result<(), BackendError>;

    /// Removes the policy of the application described by `context`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when a file or tool fails.
    fn uninstall(&self, context: &Context) -> Result<(), BackendError>;
}

/// Builds the backend for a resolved `kind`.
///
/// [`MacBackendKind::Auto`] falls back to the simulator; resolve it first
/// with [`super::resolve_mac_kind`].
#[must_use]
pub fn select(kind: MacBackendKind, policy_dir: &Utf8Path) -> Box<dyn MacBackend> {
    match kind {
        MacBackendKind::Smack => Box::new(SmackMac::new(policy_dir.join("smack"))),
        MacBackendKind::Selinux => Box::new(SelinuxMac::new(policy_dir.join("selinux"))),
        MacBackendKind::Simulate | MacBackendKind::Auto => Box::new(SimulateMac::new()),
    }
}
