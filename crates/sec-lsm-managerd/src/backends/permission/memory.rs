use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::PermissionBackend;
use crate::backends::{BACKEND_TARGET, BackendError};

/// Process-local permission store.
#[derive(Debug, Default)]
pub struct MemoryPermissions {
    grants: RefCell<BTreeMap<String, BTreeSet<String>>>,
}

impl MemoryPermissions {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants currently held by `label`.
    #[must_use]
    pub fn grants(&self, label: &str) -> BTreeSet<String> {
        self.grants
            .borrow()
            .get(label)
            .cloned()
            .unwrap_or_default()
    }
}

impl PermissionBackend for MemoryPermissions {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn check_permission(&self, label: &str, permission: &str) -> Result<bool, BackendError> {
        Ok(self
            .grants
            .borrow()
            .get(label)
            .is_some_and(|set| set.contains(permission)))
    }

    fn add_permissions(
        &self,
        label: &str,
        permissions: &BTreeSet<String>,
        drop_before: bool,
    ) -> Result<(), BackendError> {
        let mut grants = self.grants.borrow_mut();
        let entry = grants.entry(label.to_owned()).or_default();
        if drop_before {
            entry.clear();
        }
        entry.extend(permissions.iter().cloned());
        debug!(
            target: BACKEND_TARGET,
            label,
            count = entry.len(),
            "permissions stored"
        );
        Ok(())
    }

    fn drop_permissions(&self, label: &str) -> Result<(), BackendError> {
        self.grants.borrow_mut().remove(label);
        Ok(())
    }
}
