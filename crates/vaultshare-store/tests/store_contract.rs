//! Behaviour every `Store` backend must share.
//!
//! Each test is instantiated once per backend by `store_tests!`.

use std::sync::Arc;

use vaultshare_core::{
    BlobId, ContentRef, EncryptionFormat, FileId, FileVersion, KdfParams, KeyMaterial,
    PermissionEntry, PermissionId, PermissionKind, Salt, SealedBlob, SecretId, ShareGrant,
    ShareId, ShareKind, StoredFile, UserId, NONCE_LEN,
};
use vaultshare_store::{MemoryStore, SqliteStore, Store, StoreError, VersionDraft};

const OWNER: UserId = UserId(1);
const BOB: UserId = UserId(2);

fn content() -> ContentRef {
    ContentRef {
        blob_id: BlobId::generate(),
        key: KeyMaterial {
            secret_id: SecretId(1),
            salt: Salt::random(),
            kdf: KdfParams::insecure_minimum(),
        },
    }
}

fn blob(tag: u8) -> SealedBlob {
    SealedBlob {
        format: EncryptionFormat::ChaCha20Poly1305,
        nonce: [tag; NONCE_LEN],
        ciphertext: vec![tag; 24],
    }
}

fn draft(tag: u8, comment: &str) -> VersionDraft {
    VersionDraft {
        content: content(),
        blob: blob(tag),
        size: tag as u64,
        created_by: OWNER,
        created_at: 2_000 + tag as i64,
        comment: comment.into(),
    }
}

async fn seed(store: &dyn Store, owner: UserId, created_at: i64) -> StoredFile {
    let content = content();
    let file = StoredFile {
        id: FileId::generate(),
        name: "report.pdf".into(),
        owner,
        content_type: "application/pdf".into(),
        size: 10,
        created_at,
        current_version: 1,
        content: content.clone(),
    };
    let first = FileVersion {
        file_id: file.id,
        number: 1,
        content,
        size: 10,
        created_by: owner,
        created_at,
        comment: "initial upload".into(),
    };
    store.insert_file(&file, &first, &blob(1)).await.unwrap();
    file
}

fn permission(file_id: FileId, user: UserId, kind: PermissionKind, expires_at: Option<i64>) -> PermissionEntry {
    PermissionEntry {
        id: PermissionId::generate(),
        file_id,
        user_id: user,
        kind,
        granted_by: OWNER,
        granted_at: 1_000,
        expires_at,
    }
}

fn user_share(file_id: FileId, recipient: UserId, expires_at: Option<i64>) -> ShareGrant {
    ShareGrant {
        id: ShareId::generate(),
        file_id,
        created_by: OWNER,
        created_at: 1_000,
        expires_at,
        kind: ShareKind::User { recipient },
    }
}

fn link_share(file_id: FileId, expires_at: Option<i64>) -> ShareGrant {
    ShareGrant {
        id: ShareId::generate(),
        file_id,
        created_by: OWNER,
        created_at: 1_000,
        expires_at,
        kind: ShareKind::Link,
    }
}

async fn file_roundtrip(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;

    assert_eq!(store.get_file(&file.id).await.unwrap(), Some(file.clone()));
    assert_eq!(store.get_blob(&file.content.blob_id).await.unwrap(), Some(blob(1)));
    assert!(store.get_file(&FileId::generate()).await.unwrap().is_none());

    let versions = store.list_versions(&file.id).await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].comment, "initial upload");
}

async fn list_files_by_owner(store: Arc<dyn Store>) {
    let a = seed(store.as_ref(), OWNER, 1_000).await;
    let b = seed(store.as_ref(), OWNER, 2_000).await;
    seed(store.as_ref(), BOB, 1_500).await;

    let ids: Vec<FileId> = store
        .list_files(OWNER)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

async fn append_advances_pointer(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;

    let created = store
        .append_versions(&file.id, None, vec![draft(2, "v2"), draft(3, "v3")])
        .await
        .unwrap();
    assert_eq!(created.iter().map(|v| v.number).collect::<Vec<_>>(), vec![2, 3]);

    let current = store.get_file(&file.id).await.unwrap().unwrap();
    assert_eq!(current.current_version, 3);
    assert_eq!(current.size, 3);
    assert_eq!(current.content, created[1].content);
    assert_eq!(current.name, file.name);

    let v2 = store.get_version(&file.id, 2).await.unwrap().unwrap();
    assert_eq!(v2.comment, "v2");
    assert_eq!(store.get_blob(&v2.content.blob_id).await.unwrap(), Some(blob(2)));
}

async fn append_checks_expected_current(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;
    store
        .append_versions(&file.id, None, vec![draft(2, "v2")])
        .await
        .unwrap();

    let stale = store
        .append_versions(&file.id, Some(1), vec![draft(3, "snapshot"), draft(4, "restore")])
        .await;
    assert!(matches!(stale, Err(StoreError::Conflict(_))));
    assert_eq!(store.list_versions(&file.id).await.unwrap().len(), 2);

    let ok = store
        .append_versions(&file.id, Some(2), vec![draft(3, "snapshot"), draft(4, "restore")])
        .await
        .unwrap();
    assert_eq!(ok.last().unwrap().number, 4);
}

async fn append_to_missing_file(store: Arc<dyn Store>) {
    let result = store
        .append_versions(&FileId::generate(), None, vec![draft(2, "v2")])
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

async fn concurrent_appends_are_gapless(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;

    let mut handles = Vec::new();
    for i in 0..16u8 {
        let store = store.clone();
        let file_id = file.id;
        handles.push(tokio::spawn(async move {
            store
                .append_versions(&file_id, None, vec![draft(i, "concurrent")])
                .await
                .unwrap()[0]
                .number
        }));
    }

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (2..=17).collect::<Vec<u32>>());

    let current = store.get_file(&file.id).await.unwrap().unwrap();
    assert_eq!(current.current_version, 17);
}

async fn permission_upsert_keeps_id(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;

    let first = store
        .upsert_permission(&permission(file.id, BOB, PermissionKind::Read, Some(5_000)))
        .await
        .unwrap();
    let second = store
        .upsert_permission(&permission(file.id, BOB, PermissionKind::Read, None))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.expires_at, None);
    assert_eq!(store.list_permissions(&file.id).await.unwrap().len(), 1);
    assert_eq!(store.permissions_for(&file.id, BOB).await.unwrap(), vec![second.clone()]);

    assert!(store.delete_permission(&second.id).await.unwrap());
    assert!(!store.delete_permission(&second.id).await.unwrap());
    assert!(store.get_permission(&second.id).await.unwrap().is_none());
}

async fn user_share_upsert(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;

    let (first, entries) = store
        .upsert_user_share(
            &user_share(file.id, BOB, None),
            &[permission(file.id, BOB, PermissionKind::Read, None)],
        )
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);

    let (second, entries) = store
        .upsert_user_share(
            &user_share(file.id, BOB, Some(9_000)),
            &[
                permission(file.id, BOB, PermissionKind::Read, None),
                permission(file.id, BOB, PermissionKind::Write, None),
            ],
        )
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.expires_at, Some(9_000));
    assert_eq!(entries.len(), 2);
    assert_eq!(store.list_shares(&file.id).await.unwrap().len(), 1);
    assert_eq!(store.list_permissions(&file.id).await.unwrap().len(), 2);
}

async fn delete_user_share_removes_pair_permissions(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;
    let carol = UserId(3);

    let (share, _) = store
        .upsert_user_share(
            &user_share(file.id, BOB, None),
            &[
                permission(file.id, BOB, PermissionKind::Read, None),
                permission(file.id, BOB, PermissionKind::Share, None),
            ],
        )
        .await
        .unwrap();
    store
        .upsert_permission(&permission(file.id, carol, PermissionKind::Read, None))
        .await
        .unwrap();

    assert!(store.delete_share(&share.id).await.unwrap());
    assert!(!store.delete_share(&share.id).await.unwrap());

    let remaining = store.list_permissions(&file.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, carol);
}

async fn link_shares(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;
    let link = link_share(file.id, Some(10_000));

    store.insert_link_share(&link).await.unwrap();
    assert_eq!(store.get_share(&link.id).await.unwrap(), Some(link.clone()));

    let not_link = user_share(file.id, BOB, None);
    assert!(matches!(
        store.insert_link_share(&not_link).await,
        Err(StoreError::InvalidData(_))
    ));
    assert!(matches!(
        store.upsert_user_share(&link, &[]).await,
        Err(StoreError::InvalidData(_))
    ));

    assert!(store.delete_share(&link.id).await.unwrap());
    assert!(store.get_share(&link.id).await.unwrap().is_none());
}

async fn delete_file_cascades(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;
    let other = seed(store.as_ref(), OWNER, 1_000).await;
    let created = store
        .append_versions(&file.id, None, vec![draft(2, "v2")])
        .await
        .unwrap();
    let link = link_share(file.id, None);
    store.insert_link_share(&link).await.unwrap();
    store
        .upsert_user_share(
            &user_share(file.id, BOB, None),
            &[permission(file.id, BOB, PermissionKind::Read, None)],
        )
        .await
        .unwrap();
    store
        .upsert_permission(&permission(other.id, BOB, PermissionKind::Read, None))
        .await
        .unwrap();

    assert!(store.delete_file(&file.id).await.unwrap());
    assert!(!store.delete_file(&file.id).await.unwrap());

    assert!(store.get_file(&file.id).await.unwrap().is_none());
    assert!(store.list_versions(&file.id).await.unwrap().is_empty());
    assert!(store.get_blob(&file.content.blob_id).await.unwrap().is_none());
    assert!(store.get_blob(&created[0].content.blob_id).await.unwrap().is_none());
    assert!(store.list_shares(&file.id).await.unwrap().is_empty());
    assert!(store.list_permissions(&file.id).await.unwrap().is_empty());

    assert!(store.get_file(&other.id).await.unwrap().is_some());
    assert_eq!(store.list_permissions(&other.id).await.unwrap().len(), 1);
}

async fn writes_to_deleted_file_are_rejected(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;
    assert!(store.delete_file(&file.id).await.unwrap());

    assert!(matches!(
        store
            .upsert_permission(&permission(file.id, BOB, PermissionKind::Read, None))
            .await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.insert_link_share(&link_share(file.id, None)).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store
            .upsert_user_share(
                &user_share(file.id, BOB, None),
                &[permission(file.id, BOB, PermissionKind::Write, None)],
            )
            .await,
        Err(StoreError::NotFound(_))
    ));

    // A file that never existed behaves the same
    let missing = FileId::generate();
    assert!(matches!(
        store.insert_link_share(&link_share(missing, None)).await,
        Err(StoreError::NotFound(_))
    ));

    assert!(store.list_permissions(&file.id).await.unwrap().is_empty());
    assert!(store.list_shares(&file.id).await.unwrap().is_empty());
    assert!(store.list_shares(&missing).await.unwrap().is_empty());
}

async fn racing_writes_never_outlive_delete(store: Arc<dyn Store>) {
    for _ in 0..50 {
        let file = seed(store.as_ref(), OWNER, 1_000).await;

        let grant = {
            let store = Arc::clone(&store);
            let entry = permission(file.id, BOB, PermissionKind::Read, None);
            tokio::spawn(async move { store.upsert_permission(&entry).await.map(|_| ()) })
        };
        let link = {
            let store = Arc::clone(&store);
            let share = link_share(file.id, None);
            tokio::spawn(async move { store.insert_link_share(&share).await })
        };
        let share = {
            let store = Arc::clone(&store);
            let share = user_share(file.id, BOB, None);
            let entries = [permission(file.id, BOB, PermissionKind::Write, None)];
            tokio::spawn(async move {
                store
                    .upsert_user_share(&share, &entries)
                    .await
                    .map(|_| ())
            })
        };
        let delete = {
            let store = Arc::clone(&store);
            let file_id = file.id;
            tokio::spawn(async move { store.delete_file(&file_id).await })
        };

        for write in [grant, link, share] {
            match write.await.unwrap() {
                Ok(()) | Err(StoreError::NotFound(_)) => {}
                Err(e) => panic!("unexpected store error: {e}"),
            }
        }
        assert!(delete.await.unwrap().unwrap());

        assert!(store.get_file(&file.id).await.unwrap().is_none());
        assert!(store.list_permissions(&file.id).await.unwrap().is_empty());
        assert!(store.list_shares(&file.id).await.unwrap().is_empty());
    }
}

async fn purge_removes_only_expired(store: Arc<dyn Store>) {
    let file = seed(store.as_ref(), OWNER, 1_000).await;

    store
        .upsert_permission(&permission(file.id, BOB, PermissionKind::Read, Some(5_000)))
        .await
        .unwrap();
    store
        .upsert_permission(&permission(file.id, BOB, PermissionKind::Write, Some(6_000)))
        .await
        .unwrap();
    store
        .upsert_permission(&permission(file.id, BOB, PermissionKind::Share, None))
        .await
        .unwrap();
    store.insert_link_share(&link_share(file.id, Some(5_000))).await.unwrap();
    store.insert_link_share(&link_share(file.id, None)).await.unwrap();

    // Expiry is inclusive: a row expiring exactly now survives.
    let counts = store.purge_expired(5_000).await.unwrap();
    assert_eq!(counts.permissions, 0);
    assert_eq!(counts.shares, 0);

    let counts = store.purge_expired(5_001).await.unwrap();
    assert_eq!(counts.permissions, 1);
    assert_eq!(counts.shares, 1);

    assert_eq!(store.list_permissions(&file.id).await.unwrap().len(), 2);
    assert_eq!(store.list_shares(&file.id).await.unwrap().len(), 1);
}

macro_rules! store_tests {
    ($backend:ident, $make:expr) => {
        mod $backend {
            use super::*;

            fn store() -> Arc<dyn Store> {
                Arc::new($make)
            }

            #[tokio::test]
            async fn test_file_roundtrip() {
                file_roundtrip(store()).await;
            }

            #[tokio::test]
            async fn test_list_files_by_owner() {
                list_files_by_owner(store()).await;
            }

            #[tokio::test]
            async fn test_append_advances_pointer() {
                append_advances_pointer(store()).await;
            }

            #[tokio::test]
            async fn test_append_checks_expected_current() {
                append_checks_expected_current(store()).await;
            }

            #[tokio::test]
            async fn test_append_to_missing_file() {
                append_to_missing_file(store()).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_concurrent_appends_are_gapless() {
                concurrent_appends_are_gapless(store()).await;
            }

            #[tokio::test]
            async fn test_permission_upsert_keeps_id() {
                permission_upsert_keeps_id(store()).await;
            }

            #[tokio::test]
            async fn test_user_share_upsert() {
                user_share_upsert(store()).await;
            }

            #[tokio::test]
            async fn test_delete_user_share_removes_pair_permissions() {
                delete_user_share_removes_pair_permissions(store()).await;
            }

            #[tokio::test]
            async fn test_link_shares() {
                link_shares(store()).await;
            }

            #[tokio::test]
            async fn test_delete_file_cascades() {
                delete_file_cascades(store()).await;
            }

            #[tokio::test]
            async fn test_writes_to_deleted_file_are_rejected() {
                writes_to_deleted_file_are_rejected(store()).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn test_racing_writes_never_outlive_delete() {
                racing_writes_never_outlive_delete(store()).await;
            }

            #[tokio::test]
            async fn test_purge_removes_only_expired() {
                purge_removes_only_expired(store()).await;
            }
        }
    };
}

store_tests!(memory, MemoryStore::new());
store_tests!(sqlite, SqliteStore::open_memory().unwrap());
