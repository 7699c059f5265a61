//! Test fixtures and helpers.
//!
//! Common setup code for integration tests and benchmarks.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rand::RngCore;

use vaultshare::{EventSink, StaticDirectory, StoredFile, Vault, VaultConfig, VaultEvent};
use vaultshare_core::{KdfParams, ManualClock, UserId};
use vaultshare_perms::{MasterSecret, SecretRegistry};
use vaultshare_store::{MemoryStore, SqliteStore, Store};

pub const ALICE: UserId = UserId(1);
pub const BOB: UserId = UserId(2);
pub const CAROL: UserId = UserId(3);

/// Where every fixture clock starts: 2023-11-14T22:13:20Z.
pub const EPOCH_MILLIS: i64 = 1_700_000_000_000;

/// Default config with the cheapest Argon2 cost, so tests stay fast.
pub fn fast_config() -> VaultConfig {
    VaultConfig {
        kdf: KdfParams::insecure_minimum(),
        ..VaultConfig::default()
    }
}

/// A deterministic 32-byte master secret.
pub fn test_secret(seed: u8) -> MasterSecret {
    MasterSecret::new(vec![seed; 32]).expect("32 bytes is long enough")
}

/// A registry holding only `test_secret(seed)`.
pub fn test_registry(seed: u8) -> SecretRegistry {
    SecretRegistry::new(test_secret(seed))
}

/// ALICE, BOB and CAROL with example.com addresses.
pub fn test_directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_user(ALICE, "alice@example.com")
        .with_user(BOB, "bob@example.com")
        .with_user(CAROL, "carol@example.com")
}

/// `len` random bytes.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// An event sink that remembers everything it was sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<VaultEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    pub fn events(&self) -> Vec<VaultEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Forget everything received so far.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &VaultEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("recording sink poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// A vault wired to a manual clock, a recording sink and the test directory.
pub struct TestVault<S: Store> {
    pub vault: Arc<Vault<S>>,
    pub clock: Arc<ManualClock>,
    pub events: RecordingSink,
}

impl TestVault<MemoryStore> {
    /// A vault over a fresh in-memory store.
    pub fn memory() -> Self {
        Self::with_store(MemoryStore::new(), fast_config())
    }
}

impl TestVault<SqliteStore> {
    /// A vault over an in-memory SQLite database.
    pub fn sqlite() -> Self {
        let store = SqliteStore::open_memory().expect("open in-memory sqlite");
        Self::with_store(store, fast_config())
    }

    /// A vault over a SQLite database file at `path`, keyed by `test_secret(1)`.
    pub fn sqlite_at(path: impl AsRef<Path>) -> Self {
        let store = SqliteStore::open(path).expect("open sqlite file");
        Self::with_store(store, fast_config())
    }
}

impl<S: Store> TestVault<S> {
    /// Wrap `store` with `config` and `test_secret(1)`.
    pub fn with_store(store: S, config: VaultConfig) -> Self {
        let clock = Arc::new(ManualClock::new(EPOCH_MILLIS));
        let events = RecordingSink::new();
        let vault = Vault::new(store, test_registry(1), config)
            .expect("fixture config is valid")
            .with_directory(test_directory())
            .with_events(events.clone())
            .with_clock(clock.clone());

        Self {
            vault: Arc::new(vault),
            clock,
            events,
        }
    }

    /// Upload `body` as a text file owned by `owner`.
    pub async fn upload_text(&self, owner: UserId, name: &str, body: &[u8]) -> StoredFile {
        self.vault
            .upload(owner, name, "text/plain", body.to_vec())
            .await
            .expect("fixture upload")
    }

    /// Move the clock forward.
    pub fn advance_millis(&self, millis: i64) {
        self.clock.advance_millis(millis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultshare::UserDirectory;

    #[test]
    fn test_recording_sink_records() {
        let sink = RecordingSink::new();
        let event = VaultEvent::FileDeleted {
            file_id: vaultshare_core::FileId::from_bytes([1; 16]),
            deleted_by: ALICE,
        };

        sink.publish(&event).unwrap();
        assert_eq!(sink.clone().events(), vec![event]);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_directory_knows_fixture_users() {
        let directory = test_directory();
        for user in [ALICE, BOB, CAROL] {
            assert!(directory.user_exists(user).await.unwrap());
        }
        assert_eq!(
            directory.find_by_email("carol@example.com").await.unwrap(),
            Some(CAROL)
        );
    }

    #[test]
    fn test_random_bytes_len() {
        assert_eq!(random_bytes(33).len(), 33);
    }
}
