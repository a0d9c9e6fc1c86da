//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The directory database does not exist yet.
    #[error("directory database not found at {path}. Run 'warden seed' first")]
    DirectoryNotFound { path: PathBuf },

    /// An id argument is not a UUID.
    #[error("invalid id '{0}': expected a UUID")]
    InvalidId(String),

    /// `logs` needs exactly one of its selectors.
    #[error("pick exactly one of --entity-type/--entity-id, --user, or --zone")]
    AmbiguousFilter,

    /// Seed configuration is invalid.
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// An error occurred in the directory layer.
    #[error(transparent)]
    Directory(#[from] directory::Error),

    /// An error occurred in the authorization layer.
    #[error(transparent)]
    Authz(#[from] authz::Error),

    /// An error occurred in the audit layer.
    #[error(transparent)]
    Audit(#[from] audit::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
