//! Path roles accepted by the `path` command and their wire names.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Role of a path within an installed application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum PathType {
    /// Private application files.
    Default,
    /// Configuration files.
    Conf,
    /// Mutable data.
    Data,
    /// Executables.
    Exec,
    /// Files served over HTTP.
    Http,
    /// Icons.
    Icon,
    /// Identity files.
    Id,
    /// Shared libraries.
    Lib,
    /// Directory exported to other applications.
    Plug,
    /// Files readable by every application.
    Public,
}

impl PathType {
    /// Wire spelling of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Whether the path must be a directory.
    #[must_use]
    pub const fn requires_directory(self) -> bool {
        matches!(self, Self::Plug)
    }

    /// Whether adding a path of this type requires an application id.
    #[must_use]
    pub const fn needs_id(self) -> bool {
        !matches!(self, Self::Default)
    }
}
