//! Error types for the perms module.

use thiserror::Error;

use vaultshare_core::SecretId;

/// Errors that can occur during key, cipher, token or access operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Ciphertext failed authentication: tampered, truncated or wrong key.
    #[error("integrity check failed")]
    Integrity,

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Key derivation error.
    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    /// Key material names a secret the registry does not hold.
    #[error("unknown master secret: {0}")]
    UnknownSecret(SecretId),

    /// Master secret rejected.
    #[error("invalid master secret: {0}")]
    InvalidSecret(String),

    /// Share token rejected. Deliberately carries no reason.
    #[error("invalid share token")]
    InvalidToken,

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] vaultshare_core::CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
