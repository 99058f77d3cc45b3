//! MAC backend that touches nothing.

use std::cell::RefCell;
use std::collections::BTreeSet;

use tracing::info;

use super::MacBackend;
use crate::backends::{BACKEND_TARGET, BackendError};
use crate::context::Context;

/// Records installed application ids in memory.
#[derive(Debug, Default)]
pub struct SimulateMac {
    installed: RefCell<BTreeSet<String>>,
}

impl SimulateMac {
    /// Creates a simulator with nothing installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether application `app_id` is currently installed.
    #[must_use]
    pub fn is_installed(&self, app_id: &str) -> bool {
        self.installed.borrow().contains(app_id)
    }
}

impl MacBackend for SimulateMac {
    fn name(&self) -> &'static str {
        "simulate"
    }

    fn derive_label(&self, app_id: &str) -> String {
        format!("App:{app_id}")
    }

    fn install(&self, context: &Context) -> Result<(), BackendError> {
        let Some(id) = context.id() else {
            return Ok(());
        };
        info!(
            target: BACKEND_TARGET,
            id,
            paths = context.paths().len(),
            plugs = context.plugs().len(),
            "simulated MAC install"
        );
        self.installed.borrow_mut().insert(id.to_owned());
        Ok(())
    }

    fn uninstall(&self, context: &Context) -> Result<(), BackendError> {
        let Some(id) = context.id() else {
            return Ok(());
        };
        info!(target: BACKEND_TARGET, id, "simulated MAC uninstall");
        self.installed.borrow_mut().remove(id);
        Ok(())
    }
}
