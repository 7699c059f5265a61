//! # VaultShare Permissions
//!
//! Keys, ciphertext, share tokens and the authorization predicate.
//!
//! ## Encryption Model
//!
//! Content is encrypted with a per-version key that is never stored:
//!
//! 1. **Key material**: a random salt plus the id of the master secret and
//!    the Argon2id cost parameters, persisted with the version.
//! 2. **Content key**: `Argon2id(master_secret, salt)`, re-derived on every
//!    open.
//! 3. **Sealed blob**: ChaCha20-Poly1305 ciphertext with the blob id bound
//!    in as associated data.
//!
//! Master secrets are versioned in a [`SecretRegistry`]; rotating keeps the
//! old secrets so earlier content still opens.
//!
//! ## Access Model
//!
//! [`AccessState`] combines a file's owner, permission entries and shares.
//! Owners hold every kind; other users hold what their active entries say,
//! plus READ through an active user share. Link bearers hold READ only.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vaultshare_core::{BlobId, KdfParams};
//! use vaultshare_perms::{ContentSealer, MasterSecret, SecretRegistry};
//!
//! let secret = MasterSecret::new(vec![0u8; 32]).unwrap();
//! let registry = Arc::new(SecretRegistry::new(secret));
//! let sealer = ContentSealer::new(registry, KdfParams::default());
//!
//! let blob_id = BlobId::generate();
//! let (material, blob) = sealer.seal_new(b"hello".to_vec(), &blob_id).unwrap();
//! let plaintext = sealer.open(&material, blob, &blob_id).unwrap();
//! assert_eq!(plaintext, b"hello");
//! ```

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod state;
pub mod token;

pub use crypto::{EncryptionKey, EncryptionNonce, TAG_LEN};
pub use envelope::{open, seal, ContentSealer};
pub use error::{PermsError, Result};
pub use kdf::{derive_key, MasterSecret, SecretRegistry, MIN_SECRET_LEN};
pub use state::{AccessState, Principal};
pub use token::TokenSigner;
