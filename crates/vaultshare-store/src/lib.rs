//! # VaultShare Store
//!
//! Storage abstraction for VaultShare. Provides a trait-based interface for
//! file, version, share and permission persistence with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`VersionDraft`] - A version whose number the store allocates
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultshare_store::{SqliteStore, Store};
//! use vaultshare_core::UserId;
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let files = store.list_files(UserId(1)).await.unwrap();
//!     assert!(files.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Store-allocated version numbers**: callers append drafts; numbering
//!   happens inside the store's transaction, so concurrent writers on one
//!   file get distinct, gapless numbers.
//! - **Cascading deletes**: deleting a file removes its versions, blobs,
//!   shares and permission entries in one transaction.
//! - **Upserts on unique keys**: permission entries are unique per
//!   `(file, user, kind)` and user shares per `(file, recipient)`.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{PurgeCounts, Store, VersionDraft};
