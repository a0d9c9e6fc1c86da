//! Authorization error types.

use thiserror::Error;

/// Errors from the authorization layer's configuration surface.
///
/// Note these are *not* denials — a denial is a successful evaluation with
/// a [`Deny`](crate::Decision::Deny) outcome. Errors here mean the
/// composition root wired something wrong.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A capability code is not present in any role's grant table.
    ///
    /// Almost always a typo in a caller-synthesized `entity.action`
    /// string; surfacing it at startup beats silently denying forever.
    #[error("unknown capability code: {0}")]
    UnknownCapability(String),

    /// An error occurred in the directory layer.
    #[error(transparent)]
    Directory(#[from] directory::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
