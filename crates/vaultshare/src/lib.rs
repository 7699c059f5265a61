//! # VaultShare
//!
//! Encrypted file storage with version history, fine-grained permissions
//! and expiring share links.
//!
//! ## Overview
//!
//! - **Files**: uploaded content is sealed under a key derived from a master
//!   secret and a per-version salt; plaintext never reaches storage
//! - **Versions**: append-only history; restore commits a snapshot and a
//!   copy of the target instead of rewinding
//! - **Permissions**: READ, WRITE and SHARE per (file, user), each with an
//!   optional expiry
//! - **Shares**: signed bearer links and named user shares
//!
//! Every read, write, share and delete path goes through one authorization
//! gate. Callers see a stable [`ErrorKind`] and a generic message; details
//! stay in the log.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultshare::{Vault, VaultConfig};
//! use vaultshare::core::{PermissionKind, UserId};
//! use vaultshare::perms::{MasterSecret, SecretRegistry};
//! use vaultshare::store::SqliteStore;
//!
//! async fn example() -> vaultshare::Result<()> {
//!     let secret = MasterSecret::new(std::env::var("VAULT_SECRET").unwrap()).unwrap();
//!     let store = SqliteStore::open("vault.db").unwrap();
//!     let vault = Vault::new(store, SecretRegistry::new(secret), VaultConfig::default())?;
//!
//!     let alice = UserId(1);
//!     let bob = UserId(2);
//!
//!     let file = vault.upload(alice, "notes.txt", "text/plain", b"hello".to_vec()).await?;
//!     vault.grant(&file.id, alice, bob, PermissionKind::Read, None).await?;
//!     let bytes = vault.download(&file.id, bob).await?;
//!     assert_eq!(&bytes[..], b"hello");
//!
//!     let link = vault.create_link_share(&file.id, alice, 24).await?;
//!     let shared = vault.download_shared(&link.token).await?;
//!     assert_eq!(shared.name, "notes.txt");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vaultshare::core` - Records and identifiers
//! - `vaultshare::store` - Storage abstraction, SQLite and in-memory backends
//! - `vaultshare::perms` - Key derivation, encryption, tokens, access state

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod files;
pub mod sharing;
pub mod vault;

mod access;
mod content;
mod versions;

// Re-export component crates
pub use vaultshare_core as core;
pub use vaultshare_perms as perms;
pub use vaultshare_store as store;

// Re-export main types for convenience
pub use config::VaultConfig;
pub use directory::{OpenDirectory, StaticDirectory, UserDirectory};
pub use error::{ErrorKind, Result, VaultError};
pub use events::{ChannelSink, EventSink, NoopSink, VaultEvent};
pub use files::INITIAL_UPLOAD_COMMENT;
pub use sharing::{LinkShare, SharedFile};
pub use vault::Vault;

// Re-export commonly used core types
pub use vaultshare_core::{
    FileId, FileVersion, PermissionEntry, PermissionId, PermissionKind, ShareGrant, ShareId,
    StoredFile, UserId,
};
