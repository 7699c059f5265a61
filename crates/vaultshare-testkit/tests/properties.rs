//! Property tests over the whole vault.

use proptest::prelude::*;

use vaultshare::PermissionKind;
use vaultshare_perms::PermsError;
use vaultshare_testkit::generators::{
    allowed_file_name, expiry_around, key_material, permission_kind, permission_kinds, plaintext,
};
use vaultshare_testkit::{test_registry, TestVault, ALICE, BOB, EPOCH_MILLIS};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_upload_download_roundtrip(name in allowed_file_name(), body in plaintext(8192)) {
        let (stored_size, downloaded) = runtime().block_on(async {
            let tv = TestVault::memory();
            let file = tv
                .vault
                .upload(ALICE, &name, "application/octet-stream", body.clone())
                .await
                .unwrap();
            let bytes = tv.vault.download(&file.id, ALICE).await.unwrap();
            (file.size, bytes)
        });
        prop_assert_eq!(stored_size, body.len() as u64);
        prop_assert_eq!(&downloaded[..], &body[..]);
    }

    #[test]
    fn prop_authorize_follows_expiry(
        kind in permission_kind(),
        asked in permission_kind(),
        expires_at in expiry_around(EPOCH_MILLIS),
    ) {
        let allowed = runtime().block_on(async {
            let tv = TestVault::memory();
            let file = tv.upload_text(ALICE, "a.txt", b"x").await;
            tv.vault.grant(&file.id, ALICE, BOB, kind, expires_at).await.unwrap();
            tv.vault.authorize(&file.id, BOB, asked).await.unwrap()
        });

        let active = expires_at.map_or(true, |at| EPOCH_MILLIS <= at);
        prop_assert_eq!(allowed, active && kind == asked);
    }

    #[test]
    fn prop_user_share_grants_requested_kinds(kinds in permission_kinds()) {
        let granted = runtime().block_on(async {
            let tv = TestVault::memory();
            let file = tv.upload_text(ALICE, "a.txt", b"x").await;
            tv.vault.create_user_share(&file.id, ALICE, BOB, &kinds).await.unwrap();

            let mut granted = Vec::new();
            for kind in PermissionKind::ALL {
                if tv.vault.authorize(&file.id, BOB, kind).await.unwrap() {
                    granted.push(kind);
                }
            }
            granted
        });

        let mut expected = kinds.clone();
        expected.push(PermissionKind::Read);
        expected.sort();
        expected.dedup();
        prop_assert_eq!(granted, expected);
    }

    #[test]
    fn prop_unknown_secret_ids_never_derive(material in key_material()) {
        let registry = test_registry(1);
        let result = registry.rederive(&material);
        if material.secret_id == registry.active_id() {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(PermsError::UnknownSecret(id)) if id == material.secret_id));
        }
    }
}
