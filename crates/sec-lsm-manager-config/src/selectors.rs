//! Enumerated selectors: policy backends and telemetry output format.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Mandatory access control implementation used to label applications.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MacBackendKind {
    /// Probe the running kernel for SMACK, then SELinux, else simulate.
    #[default]
    Auto,
    /// Simplified Mandatory Access Control Kernel.
    Smack,
    /// Security-Enhanced Linux.
    Selinux,
    /// In-process simulation that touches nothing on the host.
    Simulate,
}

/// Permission store used to grant and query application permissions.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PermissionBackendKind {
    /// External cynagora permission service.
    #[default]
    Cynagora,
    /// Process-local map, lost on exit.
    Memory,
}

/// Output format of the daemon's telemetry.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Single human-readable line per event.
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("auto", MacBackendKind::Auto)]
    #[case("SMACK", MacBackendKind::Smack)]
    #[case("selinux", MacBackendKind::Selinux)]
    #[case("simulate", MacBackendKind::Simulate)]
    fn parses_mac_backend_names(#[case] input: &str, #[case] expected: MacBackendKind) {
        assert_eq!(input.parse::<MacBackendKind>().expect("parse"), expected);
    }

    #[test]
    fn permission_backend_defaults_to_cynagora() {
        assert_eq!(
            PermissionBackendKind::default(),
            PermissionBackendKind::Cynagora
        );
        assert_eq!(PermissionBackendKind::Memory.to_string(), "memory");
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("Compact", LogFormat::Compact)]
    fn parses_log_formats(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(input.parse::<LogFormat>().expect("parse"), expected);
        assert_eq!(expected.to_string(), input.to_ascii_lowercase());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!("pretty".parse::<LogFormat>().is_err());
    }
}
