//! Deterministic key derivation from user identity and per-user salt.
//!
//! The vault key is a SHA-256 digest over the user's stable identity and
//! the base64-encoded per-user salt, imported as an AES-256-GCM key. The
//! same (identity, salt) pair always yields the same key, so no key
//! material ever needs to be persisted: the key is rebuilt on every
//! unlock and discarded on lock.
//!
//! This replaces per-session password derivation and trades some security
//! (anyone holding identity + salt can recompute the key) for zero
//! additional user friction. The salt is not a secret; it only defeats
//! precomputation across users.

use base64::Engine;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::generate_random;
use crate::error::{CryptoError, CryptoResult};

/// Per-user salt length in bytes.
pub const SALT_LENGTH: usize = 16;

/// Per-user random salt, persisted remotely in plaintext.
///
/// Generated once at first unlock and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Generate a fresh random salt.
    pub fn random() -> Self {
        Self(generate_random())
    }

    /// Wrap raw salt bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the raw salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }

    /// Encode as base64 for storage.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Decode a stored base64 salt.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidSalt(format!("Invalid base64: {}", e)))?;

        let bytes: [u8; SALT_LENGTH] = decoded
            .try_into()
            .map_err(|v: Vec<u8>| {
                CryptoError::InvalidSalt(format!("Expected {} bytes, got {}", SALT_LENGTH, v.len()))
            })?;

        Ok(Self(bytes))
    }
}

/// Key wrapper with automatic zeroization on drop.
///
/// Held only in memory by the session; never persisted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; 32],
}

impl DerivedKey {
    /// Create a derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { key: bytes }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the 256-bit vault key for (identity, salt).
///
/// Digest layout: `SHA-256(identity_bytes || base64(salt))`. The salt goes
/// in encoded form because that is the exact string the salt store
/// persists; both unlock paths hash identical bytes.
pub fn derive_key(identity: &str, salt: &Salt) -> DerivedKey {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hasher.update(salt.to_base64().as_bytes());

    DerivedKey {
        key: hasher.finalize().into(),
    }
}

/// Encode a key as a human-copyable recovery string.
///
/// The recovery key is the session key itself, base64-encoded: an
/// alternate unlock path for when the salt store is unreachable, not a
/// second key class. Display it once at setup and never store it.
pub fn export_recovery_key(key: &DerivedKey) -> String {
    base64::engine::general_purpose::STANDARD.encode(key.as_bytes())
}

/// Import a recovery string back into a session key.
///
/// Whitespace is stripped first so keys copied out of a wrapped text
/// display still parse.
pub fn import_recovery_key(encoded: &str) -> CryptoResult<DerivedKey> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| CryptoError::InvalidRecoveryKey(e.to_string()))?;

    let bytes: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
        CryptoError::InvalidRecoveryKey(format!("Expected 32 bytes, got {}", v.len()))
    })?;

    Ok(DerivedKey::from_bytes(bytes))
}
