//! Signed share-link tokens.
//!
//! A token binds a share id to its issuance time:
//!
//! ```text
//! v1.<secret_id>.<share_id_hex>.<issued_at_ms>.<signature_hex>
//! ```
//!
//! The signature is Ed25519 over a domain-separated message, made with a
//! keypair derived from the registry secret named in the token. Tokens are
//! never stored; revoking the share row is what kills a token.
//!
//! Verification fails closed: every rejection is [`PermsError::InvalidToken`]
//! with no indication of which check failed.

use std::sync::Arc;

use zeroize::Zeroize;

use vaultshare_core::{Ed25519Signature, Keypair, SecretId, ShareId};

use crate::error::{PermsError, Result};
use crate::kdf::{MasterSecret, SecretRegistry};

const TOKEN_VERSION: &str = "v1";
const SIGNING_KEY_CONTEXT: &str = "vaultshare 2024-06-01 share-token signing key";
const MESSAGE_DOMAIN: &[u8] = b"vaultshare:share-token:v1";

/// Issues and verifies share tokens.
#[derive(Debug, Clone)]
pub struct TokenSigner {
    secrets: Arc<SecretRegistry>,
    max_age_millis: i64,
}

impl TokenSigner {
    /// Create a signer. Tokens older than `max_age_millis` never verify.
    pub fn new(secrets: Arc<SecretRegistry>, max_age_millis: i64) -> Self {
        Self {
            secrets,
            max_age_millis,
        }
    }

    /// Issue a token for `share_id` at time `now`.
    pub fn issue(&self, share_id: &ShareId, now: i64) -> Result<String> {
        let secret_id = self.secrets.active_id();
        let keypair = signing_keypair(self.secrets.get(secret_id)?);
        let signature = keypair.sign(&signed_message(secret_id, share_id, now));

        Ok(format!(
            "{}.{}.{}.{}.{}",
            TOKEN_VERSION,
            secret_id,
            share_id.to_hex(),
            now,
            signature.to_hex()
        ))
    }

    /// Verify a token at time `now` and return the share it names.
    ///
    /// Checks the signature and the token's own age only. Whether the share
    /// still exists and has not expired is up to the caller.
    pub fn verify(&self, token: &str, now: i64) -> Result<ShareId> {
        let parsed = ParsedToken::parse(token).ok_or(PermsError::InvalidToken)?;

        let secret = self
            .secrets
            .get(parsed.secret_id)
            .map_err(|_| PermsError::InvalidToken)?;
        let keypair = signing_keypair(secret);
        let message = signed_message(parsed.secret_id, &parsed.share_id, parsed.issued_at);
        keypair
            .public_key()
            .verify(&message, &parsed.signature)
            .map_err(|_| PermsError::InvalidToken)?;

        if parsed.issued_at > now || now - parsed.issued_at > self.max_age_millis {
            return Err(PermsError::InvalidToken);
        }

        Ok(parsed.share_id)
    }
}

struct ParsedToken {
    secret_id: SecretId,
    share_id: ShareId,
    issued_at: i64,
    signature: Ed25519Signature,
}

impl ParsedToken {
    fn parse(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        if parts.next()? != TOKEN_VERSION {
            return None;
        }
        let secret_id = SecretId(parts.next()?.parse().ok()?);
        let share_id = ShareId::from_hex(parts.next()?).ok()?;
        let issued_at: i64 = parts.next()?.parse().ok()?;
        let signature = Ed25519Signature::from_hex(parts.next()?).ok()?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            secret_id,
            share_id,
            issued_at,
            signature,
        })
    }
}

fn signing_keypair(secret: &MasterSecret) -> Keypair {
    let mut seed = blake3::derive_key(SIGNING_KEY_CONTEXT, secret.as_bytes());
    let keypair = Keypair::from_seed(&seed);
    seed.zeroize();
    keypair
}

fn signed_message(secret_id: SecretId, share_id: &ShareId, issued_at: i64) -> Vec<u8> {
    let mut message = Vec::with_capacity(MESSAGE_DOMAIN.len() + 4 + 16 + 8);
    message.extend_from_slice(MESSAGE_DOMAIN);
    message.extend_from_slice(&secret_id.0.to_be_bytes());
    message.extend_from_slice(share_id.as_bytes());
    message.extend_from_slice(&issued_at.to_be_bytes());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;

    fn registry(byte: u8) -> SecretRegistry {
        SecretRegistry::new(MasterSecret::new(vec![byte; 32]).unwrap())
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(Arc::new(registry(7)), 7 * 24 * HOUR)
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let share_id = ShareId::generate();

        let token = signer.issue(&share_id, 1_000).unwrap();
        assert!(token.starts_with("v1.1."));
        assert_eq!(signer.verify(&token, 1_000).unwrap(), share_id);
        assert_eq!(signer.verify(&token, 1_000 + HOUR).unwrap(), share_id);
    }

    #[test]
    fn test_flipped_character_rejected() {
        let signer = signer();
        let token = signer.issue(&ShareId::generate(), 1_000).unwrap();

        for i in 0..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
            let tampered = String::from_utf8(bytes).unwrap();
            if tampered == token {
                continue;
            }
            assert!(matches!(
                signer.verify(&tampered, 1_000),
                Err(PermsError::InvalidToken)
            ));
        }
    }

    #[test]
    fn test_max_age_enforced() {
        let signer = TokenSigner::new(Arc::new(registry(7)), HOUR);
        let token = signer.issue(&ShareId::generate(), 0).unwrap();

        assert!(signer.verify(&token, HOUR).is_ok());
        assert!(matches!(
            signer.verify(&token, HOUR + 1),
            Err(PermsError::InvalidToken)
        ));
    }

    #[test]
    fn test_future_token_rejected() {
        let signer = signer();
        let token = signer.issue(&ShareId::generate(), 10_000).unwrap();
        assert!(signer.verify(&token, 9_999).is_err());
    }

    #[test]
    fn test_other_secret_rejects() {
        let token = signer().issue(&ShareId::generate(), 0).unwrap();
        let other = TokenSigner::new(Arc::new(registry(8)), HOUR);
        assert!(matches!(other.verify(&token, 0), Err(PermsError::InvalidToken)));
    }

    #[test]
    fn test_token_survives_rotation() {
        let mut registry = registry(7);
        let share_id = ShareId::generate();
        let token = TokenSigner::new(Arc::new(registry.clone()), HOUR)
            .issue(&share_id, 0)
            .unwrap();

        registry.rotate(MasterSecret::new(vec![9u8; 32]).unwrap());
        let rotated = TokenSigner::new(Arc::new(registry), HOUR);
        assert_eq!(rotated.verify(&token, 10).unwrap(), share_id);

        let fresh = rotated.issue(&share_id, 10).unwrap();
        assert!(fresh.starts_with("v1.2."));
    }

    #[test]
    fn test_garbage_rejected() {
        let signer = signer();
        for token in ["", "v1", "v2.1.00.0.00", "v1.1.zz.0.00", "a.b.c.d.e.f"] {
            assert!(matches!(
                signer.verify(token, 0),
                Err(PermsError::InvalidToken)
            ));
        }
    }
}
