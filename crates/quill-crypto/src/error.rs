//! Error types for cryptographic operations.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Envelope string is not decodable (bad base64, truncated layout).
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Envelope carries a format version this build does not understand.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// AEAD authentication failed: the envelope was tampered with or the
    /// key is wrong. No plaintext is ever returned alongside this error.
    #[error("Decryption failed - envelope tampered or wrong key")]
    TamperedOrWrongKey,

    /// Decryption succeeded but the plaintext does not parse as the
    /// expected JSON payload.
    #[error("Malformed payload after decryption: {0}")]
    MalformedPayload(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Salt bytes are not decodable or have the wrong length.
    #[error("Invalid salt: {0}")]
    InvalidSalt(String),

    /// Recovery key string is not decodable as a 256-bit key.
    #[error("Invalid recovery key: {0}")]
    InvalidRecoveryKey(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tampered_display() {
        let err = CryptoError::TamperedOrWrongKey;
        assert!(err.to_string().contains("tampered or wrong key"));
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = CryptoError::UnsupportedVersion(9);
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn test_malformed_payload_display() {
        let err = CryptoError::MalformedPayload("expected value".to_string());
        assert!(err.to_string().contains("after decryption"));
    }
}
