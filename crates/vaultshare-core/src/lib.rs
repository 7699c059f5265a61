//! # VaultShare Core
//!
//! Pure records and primitives for the VaultShare encrypted file engine.
//!
//! This crate contains no I/O, no storage, no key derivation. It defines the
//! shapes every other crate agrees on.
//!
//! ## Key Types
//!
//! - [`StoredFile`] - A file's metadata plus a pointer at its current version
//! - [`FileVersion`] - One immutable, encrypted snapshot of a file
//! - [`ShareGrant`] - A link share or a user share, as a tagged variant
//! - [`PermissionEntry`] - A (file, user, kind) grant with optional expiry
//! - [`KeyMaterial`] - The salt and secret id a content key is derived from
//! - [`SealedBlob`] - Ciphertext plus the nonce it was sealed under
//!
//! ## Time
//!
//! All timestamps are Unix milliseconds (`i64`). Components read time through
//! the [`Clock`] trait so tests can move it.

pub mod clock;
pub mod content;
pub mod crypto;
pub mod error;
pub mod records;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{EncryptionFormat, SealedBlob, NONCE_LEN};
pub use crypto::{
    Ed25519PublicKey, Ed25519Signature, KdfParams, KeyMaterial, Keypair, Salt, SecretId, SALT_LEN,
};
pub use error::{CoreError, Result};
pub use records::{
    ContentRef, FileVersion, PermissionEntry, PermissionKind, ShareGrant, ShareKind, StoredFile,
};
pub use types::{BlobId, FileId, PermissionId, ShareId, UserId};
