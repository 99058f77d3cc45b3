//! Test harness utilities shared by the behavioural suites.

mod client;
mod config_loader;
mod daemon;
mod reporter;

pub use client::LineClient;
pub use config_loader::{FailingConfigLoader, TestConfigLoader, test_config};
pub use daemon::DaemonHarness;
pub use reporter::{HealthEvent, RecordingHealthReporter};
