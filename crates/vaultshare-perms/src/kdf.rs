//! Per-file key derivation.
//!
//! Content keys are never stored. Each one is derived with Argon2id from a
//! master secret and a random per-version salt; the salt, the secret id and
//! the cost parameters are recorded as [`KeyMaterial`] so the key can be
//! re-derived later.
//!
//! Master secrets live in a [`SecretRegistry`]. Rotating adds a new active
//! secret and keeps the old ones, so content sealed before a rotation still
//! opens. Retiring a secret makes everything derived from it unreadable; the
//! registry has no removal operation for that reason.

use std::collections::BTreeMap;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop};

use vaultshare_core::{KdfParams, KeyMaterial, Salt, SecretId};

use crate::crypto::EncryptionKey;
use crate::error::{PermsError, Result};

/// Minimum accepted master-secret length in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// A master secret. Wiped on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_SECRET_LEN {
            return Err(PermsError::InvalidSecret(format!(
                "master secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// Derive a content key from a secret and a salt.
///
/// Pure: identical inputs always produce the identical key.
pub fn derive_key(secret: &MasterSecret, salt: &Salt, params: &KdfParams) -> Result<EncryptionKey> {
    params.validate()?;
    let argon_params = Params::new(params.memory_kib, params.iterations, params.lanes, Some(32))
        .map_err(|e| PermsError::KeyDerivationError(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = [0u8; 32];
    argon2
        .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| PermsError::KeyDerivationError(e.to_string()))?;

    let key = EncryptionKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Versioned master secrets, exactly one of which is active.
#[derive(Debug, Clone)]
pub struct SecretRegistry {
    active: SecretId,
    secrets: BTreeMap<SecretId, MasterSecret>,
}

impl SecretRegistry {
    /// Create a registry whose only (and active) secret has id 1.
    pub fn new(secret: MasterSecret) -> Self {
        let id = SecretId(1);
        let mut secrets = BTreeMap::new();
        secrets.insert(id, secret);
        Self {
            active: id,
            secrets,
        }
    }

    /// Add a historical secret under an explicit id without activating it.
    ///
    /// Used when loading secrets that were rotated out in a previous run.
    pub fn with_retained(mut self, id: SecretId, secret: MasterSecret) -> Self {
        self.secrets.entry(id).or_insert(secret);
        self
    }

    /// Make `secret` the active secret under the next free id.
    pub fn rotate(&mut self, secret: MasterSecret) -> SecretId {
        let next = self
            .secrets
            .keys()
            .next_back()
            .map(|id| SecretId(id.0 + 1))
            .unwrap_or(SecretId(1));
        self.secrets.insert(next, secret);
        self.active = next;
        next
    }

    /// Id of the active secret.
    pub fn active_id(&self) -> SecretId {
        self.active
    }

    /// Look up a secret by id.
    pub fn get(&self, id: SecretId) -> Result<&MasterSecret> {
        self.secrets.get(&id).ok_or(PermsError::UnknownSecret(id))
    }

    /// The active secret.
    pub fn active(&self) -> Result<&MasterSecret> {
        self.get(self.active)
    }

    /// Generate fresh key material under the active secret and derive its key.
    pub fn generate_file_key(&self, params: &KdfParams) -> Result<(EncryptionKey, KeyMaterial)> {
        let material = KeyMaterial {
            secret_id: self.active,
            salt: Salt::random(),
            kdf: *params,
        };
        let key = derive_key(self.active()?, &material.salt, &material.kdf)?;
        Ok((key, material))
    }

    /// Re-derive the key described by `material`.
    pub fn rederive(&self, material: &KeyMaterial) -> Result<EncryptionKey> {
        derive_key(self.get(material.secret_id)?, &material.salt, &material.kdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(byte: u8) -> MasterSecret {
        MasterSecret::new(vec![byte; 32]).unwrap()
    }

    const FAST: KdfParams = KdfParams::insecure_minimum();

    #[test]
    fn test_derivation_deterministic() {
        let salt = Salt::from_bytes([7; 16]);
        let k1 = derive_key(&secret(1), &salt, &FAST).unwrap();
        let k2 = derive_key(&secret(1), &salt, &FAST).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_salt_different_key() {
        let k1 = derive_key(&secret(1), &Salt::from_bytes([1; 16]), &FAST).unwrap();
        let k2 = derive_key(&secret(1), &Salt::from_bytes([2; 16]), &FAST).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_different_secret_different_key() {
        let salt = Salt::from_bytes([1; 16]);
        let k1 = derive_key(&secret(1), &salt, &FAST).unwrap();
        let k2 = derive_key(&secret(2), &salt, &FAST).unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(MasterSecret::new(vec![0u8; 8]).is_err());
    }

    #[test]
    fn test_generate_then_rederive() {
        let registry = SecretRegistry::new(secret(1));
        let (key, material) = registry.generate_file_key(&FAST).unwrap();
        assert_eq!(material.secret_id, SecretId(1));

        let again = registry.rederive(&material).unwrap();
        assert_eq!(key.as_bytes(), again.as_bytes());
    }

    #[test]
    fn test_generate_uses_fresh_salts() {
        let registry = SecretRegistry::new(secret(1));
        let (_, m1) = registry.generate_file_key(&FAST).unwrap();
        let (_, m2) = registry.generate_file_key(&FAST).unwrap();
        assert_ne!(m1.salt, m2.salt);
    }

    #[test]
    fn test_rotation_keeps_old_material_derivable() {
        let mut registry = SecretRegistry::new(secret(1));
        let (old_key, old_material) = registry.generate_file_key(&FAST).unwrap();

        let new_id = registry.rotate(secret(2));
        assert_eq!(new_id, SecretId(2));
        assert_eq!(registry.active_id(), SecretId(2));

        let (_, new_material) = registry.generate_file_key(&FAST).unwrap();
        assert_eq!(new_material.secret_id, SecretId(2));

        let rederived = registry.rederive(&old_material).unwrap();
        assert_eq!(old_key.as_bytes(), rederived.as_bytes());
    }

    #[test]
    fn test_unknown_secret_is_an_error() {
        let registry = SecretRegistry::new(secret(1));
        let material = KeyMaterial {
            secret_id: SecretId(9),
            salt: Salt::random(),
            kdf: FAST,
        };
        assert!(matches!(
            registry.rederive(&material),
            Err(PermsError::UnknownSecret(SecretId(9)))
        ));
    }

    #[test]
    fn test_retained_secret_is_not_active() {
        let registry = SecretRegistry::new(secret(1)).with_retained(SecretId(0), secret(0));
        assert_eq!(registry.active_id(), SecretId(1));
        assert!(registry.get(SecretId(0)).is_ok());
    }
}
