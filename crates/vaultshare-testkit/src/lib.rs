//! # VaultShare Testkit
//!
//! Testing utilities for VaultShare.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a vault wired to a manual clock, a recording event sink
//!   and a small user directory, over either storage backend
//! - **Generators**: Proptest strategies for property-based testing
//!
//! The scenario tests in `tests/` run against both the in-memory and the
//! SQLite store.
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use vaultshare_testkit::fixtures::{TestVault, ALICE, BOB};
//!
//! # async fn example() {
//! let tv = TestVault::memory();
//! let file = tv.upload_text(ALICE, "notes.txt", b"hello").await;
//! assert!(tv.vault.download(&file.id, BOB).await.is_err());
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vaultshare_testkit::generators::{allowed_file_name, plaintext};
//!
//! proptest! {
//!     #[test]
//!     fn upload_roundtrips(name in allowed_file_name(), body in plaintext(4096)) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    fast_config, random_bytes, test_directory, test_registry, test_secret, RecordingSink,
    TestVault, ALICE, BOB, CAROL, EPOCH_MILLIS,
};
