//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vaultshare_core::{KeyMaterial, KdfParams, PermissionKind, Salt, SecretId, UserId};

/// Generate a user id, excluding 0.
pub fn user_id() -> impl Strategy<Value = UserId> {
    (1u64..=u64::MAX).prop_map(UserId)
}

/// Generate a permission kind.
pub fn permission_kind() -> impl Strategy<Value = PermissionKind> {
    prop_oneof![
        Just(PermissionKind::Read),
        Just(PermissionKind::Write),
        Just(PermissionKind::Share),
    ]
}

/// Generate a possibly empty, possibly repeating list of kinds.
pub fn permission_kinds() -> impl Strategy<Value = Vec<PermissionKind>> {
    prop::collection::vec(permission_kind(), 0..=4)
}

/// Generate plaintext of at most `max_len` bytes.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a file name on the default allow-list, with mixed-case extension.
pub fn allowed_file_name() -> impl Strategy<Value = String> {
    let extensions = prop_oneof![
        Just("pdf"),
        Just("TXT"),
        Just("docx"),
        Just("Png"),
        Just("csv"),
        Just("zip"),
    ];
    ("[a-zA-Z0-9_-]{1,24}", extensions).prop_map(|(stem, ext)| format!("{stem}.{ext}"))
}

/// Generate a salt.
pub fn salt() -> impl Strategy<Value = Salt> {
    any::<[u8; 16]>().prop_map(Salt::from_bytes)
}

/// Generate key material with the cheapest KDF cost.
pub fn key_material() -> impl Strategy<Value = KeyMaterial> {
    (1u32..=8, salt()).prop_map(|(id, salt)| KeyMaterial {
        secret_id: SecretId(id),
        salt,
        kdf: KdfParams::insecure_minimum(),
    })
}

/// Generate an expiry relative to `now`: none, past, exactly now, or future.
pub fn expiry_around(now: i64) -> impl Strategy<Value = Option<i64>> {
    prop_oneof![
        Just(None),
        (1i64..=1_000_000).prop_map(move |d| Some(now - d)),
        Just(Some(now)),
        (1i64..=1_000_000).prop_map(move |d| Some(now + d)),
    ]
}
