use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide protocol logging flag shared by every session.
///
/// Clones share the same flag; the last write wins.
#[derive(Debug, Clone, Default)]
pub struct LogSwitch(Arc<AtomicBool>);

impl LogSwitch {
    /// Creates a switch in the given state.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    /// Whether records are being logged.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Switches protocol logging.
    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let switch = LogSwitch::default();
        let other = switch.clone();
        other.set(true);
        assert!(switch.is_enabled());
    }
}
