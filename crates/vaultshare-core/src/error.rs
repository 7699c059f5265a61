//! Error types for VaultShare Core.

use thiserror::Error;

/// Errors raised while building or decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("unknown permission kind: {0}")]
    UnknownPermissionKind(String),

    #[error("invalid kdf parameters: {0}")]
    InvalidKdfParams(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
