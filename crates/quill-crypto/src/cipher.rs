//! AES-256-GCM cipher operations.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};

/// Generate cryptographically secure random bytes.
pub fn generate_random<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate a random IV (12 bytes).
///
/// A fresh IV is drawn for every encryption call; reuse under the same key
/// breaks GCM.
pub fn generate_iv() -> [u8; 12] {
    generate_random()
}

/// Encrypt plaintext with AES-256-GCM.
///
/// Returns ciphertext with appended authentication tag (16 bytes).
pub fn aes_gcm_encrypt(key: &[u8; 32], iv: &[u8; 12], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let nonce = Nonce::from_slice(iv);

    cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".into()))
}

/// Decrypt ciphertext with AES-256-GCM.
///
/// The ciphertext must include the authentication tag (16 bytes) at the
/// end. Any authentication failure collapses to
/// [`CryptoError::TamperedOrWrongKey`]; partial plaintext is never returned.
pub fn aes_gcm_decrypt(key: &[u8; 32], iv: &[u8; 12], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::TamperedOrWrongKey)?;

    let nonce = Nonce::from_slice(iv);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::TamperedOrWrongKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_iv() {
        let iv1 = generate_iv();
        let iv2 = generate_iv();

        assert_eq!(iv1.len(), 12);
        assert_eq!(iv2.len(), 12);
        assert_ne!(iv1, iv2); // Should be random
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; 32];
        let iv = [1u8; 12];
        let plaintext = b"Hello, World!";

        let ciphertext = aes_gcm_encrypt(&key, &iv, plaintext).unwrap();
        let decrypted = aes_gcm_decrypt(&key, &iv, &ciphertext).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_ciphertext_longer_than_plaintext() {
        let key = [42u8; 32];
        let iv = [1u8; 12];
        let plaintext = b"Hello, World!";

        let ciphertext = aes_gcm_encrypt(&key, &iv, plaintext).unwrap();

        // Ciphertext should be plaintext + 16 byte auth tag
        assert_eq!(ciphertext.len(), plaintext.len() + 16);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let key1 = [42u8; 32];
        let key2 = [99u8; 32];
        let iv = [1u8; 12];
        let plaintext = b"Secret data";

        let ciphertext = aes_gcm_encrypt(&key1, &iv, plaintext).unwrap();
        let result = aes_gcm_decrypt(&key2, &iv, &ciphertext);

        assert!(matches!(result, Err(CryptoError::TamperedOrWrongKey)));
    }

    #[test]
    fn test_decrypt_wrong_iv() {
        let key = [42u8; 32];
        let iv1 = [1u8; 12];
        let iv2 = [2u8; 12];
        let plaintext = b"Secret data";

        let ciphertext = aes_gcm_encrypt(&key, &iv1, plaintext).unwrap();
        let result = aes_gcm_decrypt(&key, &iv2, &ciphertext);

        assert!(matches!(result, Err(CryptoError::TamperedOrWrongKey)));
    }

    #[test]
    fn test_decrypt_tampered_ciphertext() {
        let key = [42u8; 32];
        let iv = [1u8; 12];
        let plaintext = b"Secret data";

        let mut ciphertext = aes_gcm_encrypt(&key, &iv, plaintext).unwrap();

        // Tamper with the ciphertext
        ciphertext[0] ^= 0xFF;

        let result = aes_gcm_decrypt(&key, &iv, &ciphertext);
        assert!(matches!(result, Err(CryptoError::TamperedOrWrongKey)));
    }

    #[test]
    fn test_encrypt_empty_plaintext() {
        let key = [42u8; 32];
        let iv = [1u8; 12];
        let plaintext = b"";

        let ciphertext = aes_gcm_encrypt(&key, &iv, plaintext).unwrap();
        let decrypted = aes_gcm_decrypt(&key, &iv, &ciphertext).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_different_ivs_different_ciphertext() {
        let key = [42u8; 32];
        let iv1 = [1u8; 12];
        let iv2 = [2u8; 12];
        let plaintext = b"Same message";

        let ciphertext1 = aes_gcm_encrypt(&key, &iv1, plaintext).unwrap();
        let ciphertext2 = aes_gcm_encrypt(&key, &iv2, plaintext).unwrap();

        assert_ne!(ciphertext1, ciphertext2);
    }
}
