//! Vault configuration.
//!
//! Everything here is safe to keep in a config file. The master secret is
//! not: it reaches the vault through a [`SecretRegistry`](vaultshare_perms::SecretRegistry).

use serde::{Deserialize, Serialize};

use vaultshare_core::KdfParams;

use crate::error::{Result, VaultError};

/// 10 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Seven days.
pub const DEFAULT_SHARE_LINK_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// Thirty days.
pub const DEFAULT_MAX_SHARE_TTL_HOURS: u32 = 720;

const DEFAULT_EXTENSIONS: [&str; 11] = [
    ".pdf", ".doc", ".docx", ".txt", ".jpg", ".jpeg", ".png", ".xlsx", ".xls", ".csv", ".zip",
];

/// Configuration for the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Largest accepted plaintext, in bytes.
    pub max_upload_size: u64,

    /// Accepted file extensions, with the leading dot.
    pub allowed_extensions: Vec<String>,

    /// Accepted content types. Empty means only the extension is checked.
    pub allowed_content_types: Vec<String>,

    /// Oldest share token that still verifies, regardless of share expiry.
    pub share_link_max_age_secs: u64,

    /// Upper bound for `ttl_hours` on link shares. A link's expiry is still
    /// capped at `share_link_max_age_secs`.
    pub max_share_ttl_hours: u32,

    /// Argon2id cost for new key material.
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            allowed_content_types: Vec::new(),
            share_link_max_age_secs: DEFAULT_SHARE_LINK_MAX_AGE_SECS,
            max_share_ttl_hours: DEFAULT_MAX_SHARE_TTL_HOURS,
            kdf: KdfParams::default(),
        }
    }
}

impl VaultConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VaultError::InvalidArgument(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_size == 0 {
            return Err(VaultError::InvalidArgument(
                "max_upload_size must be positive".into(),
            ));
        }
        if self.max_share_ttl_hours == 0 {
            return Err(VaultError::InvalidArgument(
                "max_share_ttl_hours must be positive".into(),
            ));
        }
        if self.share_link_max_age_secs == 0 {
            return Err(VaultError::InvalidArgument(
                "share_link_max_age_secs must be positive".into(),
            ));
        }
        if let Some(bad) = self.allowed_extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(VaultError::InvalidArgument(format!(
                "extension {:?} must start with '.'",
                bad
            )));
        }
        self.kdf
            .validate()
            .map_err(|e| VaultError::InvalidArgument(e.to_string()))
    }

    /// Share-token max age in milliseconds.
    pub fn share_link_max_age_millis(&self) -> i64 {
        (self.share_link_max_age_secs as i64).saturating_mul(1000)
    }

    /// Check an upload before any cryptographic or storage work.
    pub fn validate_upload(&self, name: &str, content_type: &str, size: usize) -> Result<()> {
        if name.trim().is_empty() {
            return Err(VaultError::InvalidArgument("file name must not be empty".into()));
        }
        self.check_size(size)?;

        let extension = match name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => format!(".{}", ext.to_ascii_lowercase()),
            _ => return Err(VaultError::TypeNotAllowed),
        };
        if !self
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(VaultError::TypeNotAllowed);
        }

        if !self.allowed_content_types.is_empty() {
            let essence = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim();
            if !self
                .allowed_content_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(essence))
            {
                return Err(VaultError::TypeNotAllowed);
            }
        }

        Ok(())
    }

    /// Reject payloads over the size limit.
    pub fn check_size(&self, size: usize) -> Result<()> {
        if size as u64 > self.max_upload_size {
            return Err(VaultError::SizeExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind(result: Result<()>) -> Option<ErrorKind> {
        result.err().map(|e| e.kind())
    }

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.allowed_extensions.len(), 11);
        assert_eq!(config.share_link_max_age_millis(), 604_800_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let config = VaultConfig::default();
        let max = config.max_upload_size as usize;
        assert!(config.validate_upload("a.txt", "text/plain", max).is_ok());
        assert_eq!(
            kind(config.validate_upload("a.txt", "text/plain", max + 1)),
            Some(ErrorKind::SizeExceeded)
        );
    }

    #[test]
    fn test_extension_checks() {
        let config = VaultConfig::default();
        assert!(config.validate_upload("Report.PDF", "application/pdf", 1).is_ok());
        assert!(config.validate_upload("archive.tar.zip", "application/zip", 1).is_ok());
        for name in ["script.exe", "noext", "trailing.", "pdf"] {
            assert_eq!(
                kind(config.validate_upload(name, "application/octet-stream", 1)),
                Some(ErrorKind::TypeNotAllowed),
                "{name}"
            );
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let config = VaultConfig::default();
        assert_eq!(
            kind(config.validate_upload("  ", "text/plain", 1)),
            Some(ErrorKind::InvalidArgument)
        );
    }

    #[test]
    fn test_content_type_allow_list() {
        let config = VaultConfig {
            allowed_content_types: vec!["text/plain".into()],
            ..VaultConfig::default()
        };
        assert!(config
            .validate_upload("a.txt", "text/plain; charset=utf-8", 1)
            .is_ok());
        assert_eq!(
            kind(config.validate_upload("a.txt", "text/html", 1)),
            Some(ErrorKind::TypeNotAllowed)
        );
    }

    #[test]
    fn test_from_json_partial() {
        let config = VaultConfig::from_json(
            r#"{ "max_upload_size": 1024, "kdf": { "memory_kib": 8, "iterations": 1, "lanes": 1 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_upload_size, 1024);
        assert_eq!(config.kdf, KdfParams::insecure_minimum());
        assert_eq!(config.max_share_ttl_hours, DEFAULT_MAX_SHARE_TTL_HOURS);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(VaultConfig::from_json(r#"{ "max_upload_size": 0 }"#).is_err());
        assert!(VaultConfig::from_json(r#"{ "allowed_extensions": ["pdf"] }"#).is_err());
        assert!(VaultConfig::from_json(
            r#"{ "kdf": { "memory_kib": 8, "iterations": 0, "lanes": 1 } }"#
        )
        .is_err());
        assert!(VaultConfig::from_json("not json").is_err());
    }
}
