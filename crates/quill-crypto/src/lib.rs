//! # quill-crypto
//!
//! Cryptographic primitives for quill's zero-knowledge vault.
//!
//! This crate owns the envelope cipher and key derivation used by the
//! encrypted storage layer. The remote store only ever sees envelope
//! strings; every key lives in memory on the client and dies with the
//! session.
//!
//! ## Cryptographic Primitives
//!
//! - **Symmetric cipher**: AES-256-GCM (AEAD, 96-bit IV, 128-bit tag)
//! - **Key derivation**: SHA-256 over (identity, per-user salt), deterministic
//! - **Random generation**: thread-local CSPRNG for salts and IVs
//! - **Key hygiene**: zeroization on drop, redacted Debug output
//!
//! ## Envelope Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │ Version: 0x01 (1 byte)                          │
//! ├─────────────────────────────────────────────────┤
//! │ IV (12 bytes, fresh random per encryption)      │
//! ├─────────────────────────────────────────────────┤
//! │ Ciphertext (AES-256-GCM)                        │
//! ├─────────────────────────────────────────────────┤
//! │ Authentication tag (16 bytes)                   │
//! └─────────────────────────────────────────────────┘
//! ```
//! The whole buffer is base64-encoded into a single string column. A
//! legacy `base64(iv):base64(tag):base64(ciphertext)` layout remains
//! decodable for pre-unification rows; it is never written.
//!
//! ## Examples
//!
//! ### Derive a key and seal a field
//!
//! ```rust
//! use quill_crypto::{derive_key, seal_json, open_json, Salt};
//! use serde_json::json;
//!
//! let salt = Salt::random();
//! let key = derive_key("u1", &salt);
//!
//! let envelope = seal_json(&key, &json!({"content": "hello"})).unwrap();
//! let payload = open_json(&key, &envelope).unwrap();
//! assert_eq!(payload, json!({"content": "hello"}));
//! ```
//!
//! ### Recovery key
//!
//! ```rust
//! use quill_crypto::{derive_key, export_recovery_key, import_recovery_key, Salt};
//!
//! let key = derive_key("u1", &Salt::random());
//! let recovery = export_recovery_key(&key);
//!
//! let restored = import_recovery_key(&recovery).unwrap();
//! assert_eq!(key.as_bytes(), restored.as_bytes());
//! ```

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod kdf;

// Re-export commonly used types
pub use envelope::{
    detect_format, open, open_compat, open_json, open_legacy, seal, seal_json, EnvelopeFormat,
    ENVELOPE_VERSION, IV_LENGTH, TAG_LENGTH,
};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{
    derive_key, export_recovery_key, import_recovery_key, DerivedKey, Salt, SALT_LENGTH,
};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    /// Full vault-key workflow: derive -> seal -> detect -> open.
    #[test]
    fn test_full_envelope_workflow() {
        let salt = Salt::random();
        let key = derive_key("u1", &salt);

        let payload = json!({"name": "Ada", "summary": "met at the library"});
        let envelope = seal_json(&key, &payload).unwrap();

        assert_eq!(detect_format(&envelope), EnvelopeFormat::Versioned);
        assert_eq!(open_json(&key, &envelope).unwrap(), payload);

        // A different user's key cannot open it.
        let other = derive_key("u2", &Salt::random());
        assert!(open_json(&other, &envelope).is_err());
    }

    /// The recovery path opens the same envelopes as the derived path.
    #[test]
    fn test_recovery_key_opens_same_envelopes() {
        let salt = Salt::random();
        let key = derive_key("u1", &salt);
        let envelope = seal_json(&key, &json!("field value")).unwrap();

        let restored = import_recovery_key(&export_recovery_key(&key)).unwrap();
        assert_eq!(open_json(&restored, &envelope).unwrap(), json!("field value"));
    }
}
