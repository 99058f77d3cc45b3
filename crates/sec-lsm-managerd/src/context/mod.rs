//! Staged description of one application's security policy.
//!
//! A [`Context`] accumulates the id, paths, permissions and plugs sent by a
//! client. Nothing touches the system until the orchestrator in
//! [`crate::action`] commits it. Every mutator validates its arguments, then
//! checks for duplicates, then probes the filesystem, and leaves the context
//! untouched on failure.

mod errors;
mod path_type;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::ops::ControlFlow;

use camino::{Utf8Path, Utf8PathBuf};

pub use errors::ContextError;
pub use path_type::PathType;

const ID_MIN_LEN: usize = 2;
const ID_MAX_LEN: usize = 200;
const PERMISSION_MAX_LEN: usize = 1024;
const PATH_MAX_LEN: usize = 4096;

/// A labelled path of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPath {
    /// Filesystem location.
    pub path: Utf8PathBuf,
    /// Role of the location.
    pub kind: PathType,
}

/// A directory exported by this application and imported by another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plug {
    /// Directory exported by the application being staged.
    pub export_dir: Utf8PathBuf,
    /// Application importing the directory.
    pub import_id: String,
    /// Directory of the importing application receiving the export.
    pub import_dir: Utf8PathBuf,
}

/// Element yielded by [`Context::visit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextItem<'a> {
    /// The application id.
    Id(&'a str),
    /// A labelled path.
    Path(&'a AppPath),
    /// A permission.
    Permission(&'a str),
    /// A plug.
    Plug(&'a Plug),
}

/// Mutable, connection-owned application descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    id: Option<String>,
    need_id: bool,
    paths: Vec<AppPath>,
    permissions: BTreeSet<String>,
    plugs: Vec<Plug>,
    error: bool,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Application id, when set.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether staged content requires an application id.
    #[must_use]
    pub const fn need_id(&self) -> bool {
        self.need_id
    }

    /// Staged paths in insertion order.
    #[must_use]
    pub fn paths(&self) -> &[AppPath] {
        &self.paths
    }

    /// Staged permissions.
    #[must_use]
    pub const fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    /// Staged plugs in insertion order.
    #[must_use]
    pub fn plugs(&self) -> &[Plug] {
        &self.plugs
    }

    /// Sets the application id.
    ///
    /// # Errors
    ///
    /// Fails when the context is flagged, the id is malformed or an id is
    /// already set.
    pub fn set_id(&mut self, id: &str) -> Result<(), ContextError> {
        self.ensure_usable()?;
        if !is_valid_id(id) {
            return Err(ContextError::InvalidId(id.to_owned()));
        }
        if let Some(current) = &self.id {
            return Err(ContextError::IdAlreadySet(current.clone()));
        }
        self.id = Some(id.to_owned());
        Ok(())
    }

    /// Adds a permission.
    ///
    /// # Errors
    ///
    /// Fails when the context is flagged, the permission is empty, too long
    /// or contains whitespace or control characters, or it is already present.
    pub fn add_permission(&mut self, permission: &str) -> Result<(), ContextError> {
        self.ensure_usable()?;
        if !is_valid_permission(permission) {
            return Err(ContextError::InvalidPermission(permission.to_owned()));
        }
        if self.permissions.contains(permission) {
            return Err(ContextError::PermissionExists(permission.to_owned()));
        }
        self.permissions.insert(permission.to_owned());
        self.need_id = true;
        Ok(())
    }

    /// Adds a labelled path.
    ///
    /// # Errors
    ///
    /// Fails when the context is flagged, the path is malformed or already
    /// present, or the filesystem does not hold a suitable entry.
    pub fn add_path(&mut self, path: &str, kind: PathType) -> Result<(), ContextError> {
        self.ensure_usable()?;
        if path.is_empty() || path.len() > PATH_MAX_LEN || path.contains('\0') {
            return Err(ContextError::InvalidPath(path.to_owned()));
        }
        let path = Utf8PathBuf::from(path);
        if self.paths.iter().any(|entry| entry.path == path) {
            return Err(ContextError::PathExists(path));
        }
        probe(&path, kind.requires_directory())?;
        self.need_id |= kind.needs_id();
        self.paths.push(AppPath { path, kind });
        Ok(())
    }

    /// Adds a plug exporting `export_dir` to application `import_id`.
    ///
    /// # Errors
    ///
    /// Fails when the context is flagged, an argument is malformed, the import
    /// directory is already used, or a directory is missing.
    pub fn add_plug(
        &mut self,
        export_dir: &str,
        import_id: &str,
        import_dir: &str,
    ) -> Result<(), ContextError> {
        self.ensure_usable()?;
        for dir in [export_dir, import_dir] {
            if dir.is_empty() || dir.len() > PATH_MAX_LEN || dir.contains('\0') {
                return Err(ContextError::InvalidPath(dir.to_owned()));
            }
        }
        if !is_valid_id(import_id) {
            return Err(ContextError::InvalidId(import_id.to_owned()));
        }
        let import_dir = Utf8PathBuf::from(import_dir);
        if self.plugs.iter().any(|plug| plug.import_dir == import_dir) {
            return Err(ContextError::PlugExists(import_dir));
        }
        let export_dir = Utf8PathBuf::from(export_dir);
        probe(&export_dir, true)?;
        probe(&import_dir, true)?;
        self.plugs.push(Plug {
            export_dir,
            import_id: import_id.to_owned(),
            import_dir,
        });
        self.need_id = true;
        Ok(())
    }

    /// Whether `permission` is staged.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Latches the error state.
    pub const fn raise_error(&mut self) {
        self.error = true;
    }

    /// Whether the error state is latched.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error
    }

    /// Returns the context to its empty state, releasing the error latch.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Streams the id, then paths, then permissions, then plugs to `visitor`,
    /// stopping at the first [`ControlFlow::Break`].
    pub fn visit<B, F>(&self, mut visitor: F) -> ControlFlow<B>
    where
        F: FnMut(ContextItem<'_>) -> ControlFlow<B>,
    {
        if let Some(id) = &self.id {
            visitor(ContextItem::Id(id))?;
        }
        for path in &self.paths {
            visitor(ContextItem::Path(path))?;
        }
        for permission in &self.permissions {
            visitor(ContextItem::Permission(permission))?;
        }
        for plug in &self.plugs {
            visitor(ContextItem::Plug(plug))?;
        }
        ControlFlow::Continue(())
    }

    const fn ensure_usable(&self) -> Result<(), ContextError> {
        if self.error {
            Err(ContextError::Flagged)
        } else {
            Ok(())
        }
    }
}

/// Whether `id` matches `[A-Za-z0-9_-]{2,200}`.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    (ID_MIN_LEN..=ID_MAX_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
}

fn is_valid_permission(permission: &str) -> bool {
    !permission.is_empty()
        && permission.len() <= PERMISSION_MAX_LEN
        && !permission
            .chars()
            .any(|ch| ch.is_whitespace() || ch.is_control())
}

fn probe(path: &Utf8Path, directory: bool) -> Result<(), ContextError> {
    match fs::metadata(path) {
        Ok(metadata) if directory && !metadata.is_dir() => {
            Err(ContextError::NotADirectory(path.to_path_buf()))
        }
        Ok(_) => Ok(()),
        Err(error) => Err(match error.kind() {
            io::ErrorKind::NotFound => ContextError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ContextError::AccessDenied(path.to_path_buf()),
            io::ErrorKind::NotADirectory => ContextError::NotFound(path.to_path_buf()),
            _ => ContextError::Inspect {
                path: path.to_path_buf(),
                source: error,
            },
        }),
    }
}
