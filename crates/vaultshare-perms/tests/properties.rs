//! Property tests for key derivation and content sealing.

use std::sync::Arc;

use proptest::prelude::*;

use vaultshare_core::{BlobId, KdfParams, Salt};
use vaultshare_perms::{
    derive_key, open, seal, ContentSealer, EncryptionKey, MasterSecret, PermsError,
    SecretRegistry,
};

const FAST: KdfParams = KdfParams::insecure_minimum();

fn secret() -> impl Strategy<Value = MasterSecret> {
    prop::collection::vec(any::<u8>(), 16..64).prop_map(|bytes| MasterSecret::new(bytes).unwrap())
}

fn payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_seal_open_roundtrip(plaintext in payload(), aad in any::<[u8; 16]>()) {
        let key = EncryptionKey::generate();
        let blob = seal(plaintext.clone(), &key, &aad).unwrap();
        prop_assert_eq!(open(blob, &key, &aad).unwrap(), plaintext);
    }

    #[test]
    fn prop_wrong_key_is_integrity_error(
        plaintext in payload(),
        k1 in any::<[u8; 32]>(),
        k2 in any::<[u8; 32]>(),
    ) {
        prop_assume!(k1 != k2);
        let blob = seal(plaintext, &EncryptionKey::from_bytes(k1), b"aad").unwrap();
        let result = open(blob, &EncryptionKey::from_bytes(k2), b"aad");
        prop_assert!(matches!(result, Err(PermsError::Integrity)));
    }

    #[test]
    fn prop_derivation_is_deterministic(secret in secret(), salt in any::<[u8; 16]>()) {
        let salt = Salt::from_bytes(salt);
        let k1 = derive_key(&secret, &salt, &FAST).unwrap();
        let k2 = derive_key(&secret, &salt, &FAST).unwrap();
        prop_assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn prop_sealer_roundtrip_under_rederived_key(secret in secret(), plaintext in payload()) {
        let sealer = ContentSealer::new(Arc::new(SecretRegistry::new(secret)), FAST);
        let blob_id = BlobId::generate();
        let (material, blob) = sealer.seal_new(plaintext.clone(), &blob_id).unwrap();
        prop_assert_eq!(sealer.open(&material, blob, &blob_id).unwrap(), plaintext);
    }
}
