//! Permission stores keyed by security label.

mod cynagora;
mod memory;

use std::collections::BTreeSet;

pub use cynagora::CynagoraPermissions;
pub use memory::MemoryPermissions;

use super::BackendError;

/// Grants, revokes and checks permissions for a security label.
pub trait PermissionBackend {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether `label` holds `permission`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the store cannot answer.
    fn check_permission(&self, label: &str, permission: &str) -> Result<bool, BackendError>;

    /// Grants `permissions` to `label`, first revoking every existing grant
    /// when `drop_before` is set. The change is applied atomically.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the store rejects the change.
    fn add_permissions(
        &self,
        label: &str,
        permissions: &BTreeSet<String>,
        drop_before: bool,
    ) -> Result<(), BackendError>;

    /// Revokes every grant held by `label`.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] when the store rejects the change.
    fn drop_permissions(&self, label: &str) -> Result<(), BackendError>;
}
