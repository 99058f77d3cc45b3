//! Install and uninstall transactions.
//!
//! Neither backend offers a transaction spanning both stores, so install
//! grants permissions first and revokes them again when the MAC backend
//! fails. Uninstall revokes permissions first and never compensates.

use thiserror::Error;
use tracing::{info, warn};

use sec_lsm_manager_protocol::ErrorKind;

use crate::backends::{BackendError, MacBackend, PermissionBackend};
use crate::context::{Context, Plug};

pub(crate) const ACTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::action");

/// Permission marking an importing application as accepting public plugs.
pub const PUBLIC_PLUGS_PERMISSION: &str = "urn:redpesk:permission::public:plugs";

/// Failures of an install or uninstall transaction.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The context latched an earlier failure.
    #[error("context is in its error state; clear it first")]
    Unrecoverable,
    /// The staged content requires an application id.
    #[error("an application id is required")]
    MissingId,
    /// The application does not declare the plug export permission.
    #[error("'{app_id}' lacks permission '{required}' to export to '{import_id}'")]
    PlugForbidden {
        /// Exporting application.
        app_id: String,
        /// Importing application.
        import_id: String,
        /// Permission the exporting application must declare.
        required: String,
    },
    /// The permission backend failed.
    #[error("permission backend failed: {0}")]
    Permission(#[source] BackendError),
    /// The MAC backend failed.
    #[error("MAC backend failed: {0}")]
    Mac(#[source] BackendError),
}

impl ActionError {
    /// Failure class reported to clients.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unrecoverable => ErrorKind::Unrecoverable,
            Self::MissingId => ErrorKind::InvalidArgument,
            Self::PlugForbidden { .. } => ErrorKind::AccessDenied,
            Self::Permission(error) | Self::Mac(error) => error.kind(),
        }
    }
}

/// Commits `context` to both backends.
///
/// # Errors
///
/// Returns the first failure. When the MAC backend fails after permissions
/// were granted, the grants are revoked and the MAC error is returned even
/// if the revocation fails too.
pub fn install(
    context: &Context,
    permissions: &dyn PermissionBackend,
    mac: &dyn MacBackend,
) -> Result<(), ActionError> {
    ensure_ready(context)?;
    check_plugs(context, permissions, mac)?;

    let label = context.id().map(|id| mac.derive_label(id));
    if let Some(label) = &label {
        permissions
            .add_permissions(label, context.permissions(), true)
            .map_err(ActionError::Permission)?;
    }

    if let Err(error) = mac.install(context) {
        if let Some(label) = &label
            && let Err(rollback) = permissions.drop_permissions(label)
        {
            warn!(
                target: ACTION_TARGET,
                label = %label,
                error = %rollback,
                "failed to revoke permissions after MAC install failure"
            );
        }
        return Err(ActionError::Mac(error));
    }

    info!(
        target: ACTION_TARGET,
        id = context.id().unwrap_or_default(),
        permissions = context.permissions().len(),
        paths = context.paths().len(),
        plugs = context.plugs().len(),
        "application installed"
    );
    Ok(())
}

/// Retracts `context` from both backends.
///
/// # Errors
///
/// Returns the first failure; nothing is restored.
pub fn uninstall(
    context: &Context,
    permissions: &dyn PermissionBackend,
    mac: &dyn MacBackend,
) -> Result<(), ActionError> {
    ensure_ready(context)?;
    if let Some(id) = context.id() {
        permissions
            .drop_permissions(&mac.derive_label(id))
            .map_err(ActionError::Permission)?;
    }
    mac.uninstall(context).map_err(ActionError::Mac)?;
    info!(
        target: ACTION_TARGET,
        id = context.id().unwrap_or_default(),
        "application uninstalled"
    );
    Ok(())
}

fn ensure_ready(context: &Context) -> Result<(), ActionError> {
    if context.has_error() {
        return Err(ActionError::Unrecoverable);
    }
    if context.need_id() && context.id().is_none() {
        return Err(ActionError::MissingId);
    }
    Ok(())
}

/// Checks every plug and reports the first failure once all were checked.
fn check_plugs(
    context: &Context,
    permissions: &dyn PermissionBackend,
    mac: &dyn MacBackend,
) -> Result<(), ActionError> {
    let Some(app_id) = context.id() else {
        return Ok(());
    };
    let mut first_error = None;
    for plug in context.plugs() {
        if let Err(error) = check_plug(app_id, plug, context, permissions, mac) {
            first_error.get_or_insert(error);
        }
    }
    first_error.map_or(Ok(()), Err)
}

fn check_plug(
    app_id: &str,
    plug: &Plug,
    context: &Context,
    permissions: &dyn PermissionBackend,
    mac: &dyn MacBackend,
) -> Result<(), ActionError> {
    let importer = mac.derive_label(&plug.import_id);
    let public = permissions
        .check_permission(&importer, PUBLIC_PLUGS_PERMISSION)
        .map_err(ActionError::Permission)?;
    let scope = if public { "public" } else { "partner" };
    let required = format!("urn:redpesk:permission:{app_id}:{scope}:export:plug");
    if context.has_permission(&required) {
        Ok(())
    } else {
        Err(ActionError::PlugForbidden {
            app_id: app_id.to_owned(),
            import_id: plug.import_id.clone(),
            required,
        })
    }
}
