//! Strong identifier types for VaultShare.
//!
//! All identifiers are newtypes to prevent mixing a file id with a share id
//! at compile time. Random identifiers are 128-bit values from the OS RNG.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

macro_rules! random_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                let mut bytes = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                let bytes = hex::decode(s).map_err(|e| CoreError::InvalidId(e.to_string()))?;
                Self::try_from(bytes.as_slice())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), &self.to_hex()[..12])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 16]> for $name {
            fn from(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 16] = slice.try_into().map_err(|_| {
                    CoreError::InvalidId(format!(
                        concat!($label, " must be 16 bytes, got {}"),
                        slice.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }
    };
}

random_id!(
    /// Public identifier of a stored file.
    FileId,
    "FileId"
);

random_id!(
    /// Opaque key of an encrypted blob.
    ///
    /// Deliberately unrelated to the [`FileId`] so that knowing a file's
    /// public id says nothing about where its ciphertext lives.
    BlobId,
    "BlobId"
);

random_id!(
    /// Identifier of a link or user share.
    ShareId,
    "ShareId"
);

random_id!(
    /// Identifier of a permission entry.
    PermissionId,
    "PermissionId"
);

/// Identifier of a user, issued by the external user subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
