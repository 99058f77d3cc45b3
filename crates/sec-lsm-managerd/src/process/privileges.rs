//! Switches the daemon to an unprivileged account after binding.

use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User, setgid, setgroups, setuid};
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Errors raised while changing the process credentials.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    /// The account database could not be queried.
    #[error("failed to look up {what} '{name}': {source}")]
    Lookup {
        /// Either `user` or `group`.
        what: &'static str,
        /// Name being resolved.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// No user carries the configured name.
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    /// No group carries the configured name.
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    /// A credential switch was refused by the kernel.
    #[error("{call} failed: {source}")]
    Switch {
        /// System call that failed.
        call: &'static str,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

/// Credentials the process switches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Credentials {
    pub(crate) uid: Option<Uid>,
    pub(crate) gid: Option<Gid>,
}

/// Resolves `user` and `group`. Without a group, the user's primary group
/// is used.
pub(crate) fn resolve(
    user: Option<&str>,
    group: Option<&str>,
) -> Result<Credentials, PrivilegeError> {
    let user = user
        .map(|name| {
            User::from_name(name)
                .map_err(|source| PrivilegeError::Lookup {
                    what: "user",
                    name: name.to_owned(),
                    source,
                })?
                .ok_or_else(|| PrivilegeError::UnknownUser(name.to_owned()))
        })
        .transpose()?;
    let group_gid = group
        .map(|name| {
            Group::from_name(name)
                .map_err(|source| PrivilegeError::Lookup {
                    what: "group",
                    name: name.to_owned(),
                    source,
                })?
                .map(|found| found.gid)
                .ok_or_else(|| PrivilegeError::UnknownGroup(name.to_owned()))
        })
        .transpose()?;
    Ok(Credentials {
        uid: user.as_ref().map(|found| found.uid),
        gid: group_gid.or_else(|| user.as_ref().map(|found| found.gid)),
    })
}

/// Drops supplementary groups, then switches group and user.
///
/// Does nothing when neither name is configured.
pub(crate) fn drop_privileges(
    user: Option<&str>,
    group: Option<&str>,
) -> Result<(), PrivilegeError> {
    let credentials = resolve(user, group)?;
    if let Some(gid) = credentials.gid {
        setgroups(&[]).map_err(|source| PrivilegeError::Switch {
            call: "setgroups",
            source,
        })?;
        setgid(gid).map_err(|source| PrivilegeError::Switch {
            call: "setgid",
            source,
        })?;
    }
    if let Some(uid) = credentials.uid {
        setuid(uid).map_err(|source| PrivilegeError::Switch {
            call: "setuid",
            source,
        })?;
    }
    if credentials.uid.is_some() || credentials.gid.is_some() {
        info!(
            target: PROCESS_TARGET,
            uid = credentials.uid.map(Uid::as_raw),
            gid = credentials.gid.map(Gid::as_raw),
            "dropped privileges"
        );
    }
    Ok(())
}
