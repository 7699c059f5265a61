//! Error types for the vault.
//!
//! [`VaultError`] is what callers see. Its `Display` output is a fixed,
//! generic message per kind; details from lower layers are logged where they
//! are converted and never carried outward.

use std::fmt;

use thiserror::Error;

use vaultshare_perms::PermsError;
use vaultshare_store::StoreError;

/// Errors returned by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Unknown file, version, share, permission or user.
    #[error("not found")]
    NotFound,

    /// The requester is not allowed to do this.
    #[error("forbidden")]
    Forbidden,

    /// Upload larger than the configured maximum.
    #[error("file exceeds the maximum upload size")]
    SizeExceeded,

    /// Extension or content type not on the allow-list.
    #[error("file type not allowed")]
    TypeNotAllowed,

    /// Stored ciphertext failed authentication.
    #[error("stored content failed integrity check")]
    Integrity,

    /// Share token rejected.
    #[error("invalid share token")]
    InvalidToken,

    /// Lost a race with a concurrent writer.
    #[error("conflicting concurrent update")]
    Conflict,

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Anything else. Details are in the server log only.
    #[error("internal error")]
    Internal,
}

/// Stable discriminant of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    SizeExceeded,
    TypeNotAllowed,
    IntegrityError,
    InvalidToken,
    Conflict,
    InvalidArgument,
    Internal,
}

impl ErrorKind {
    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Forbidden => "Forbidden",
            Self::SizeExceeded => "SizeExceeded",
            Self::TypeNotAllowed => "TypeNotAllowed",
            Self::IntegrityError => "IntegrityError",
            Self::InvalidToken => "InvalidToken",
            Self::Conflict => "Conflict",
            Self::InvalidArgument => "InvalidArgument",
            Self::Internal => "Internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultError {
    /// The stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::SizeExceeded => ErrorKind::SizeExceeded,
            Self::TypeNotAllowed => ErrorKind::TypeNotAllowed,
            Self::Integrity => ErrorKind::IntegrityError,
            Self::InvalidToken => ErrorKind::InvalidToken,
            Self::Conflict => ErrorKind::Conflict,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Internal => ErrorKind::Internal,
        }
    }

    /// Log `err` and collapse it to [`VaultError::Internal`].
    pub(crate) fn internal(err: impl fmt::Display) -> Self {
        tracing::error!(error = %err, "internal error");
        Self::Internal
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => {
                tracing::debug!(%what, "store lookup missed");
                Self::NotFound
            }
            StoreError::Conflict(what) => {
                tracing::warn!(%what, "store write lost a race");
                Self::Conflict
            }
            other => Self::internal(other),
        }
    }
}

impl From<PermsError> for VaultError {
    fn from(err: PermsError) -> Self {
        match err {
            PermsError::Integrity => Self::Integrity,
            PermsError::InvalidToken => Self::InvalidToken,
            other => Self::internal(other),
        }
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(err)
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
