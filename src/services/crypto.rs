//! Credential encryption.
//!
//! AES-256-GCM with a random 96-bit nonce per message. The stored form is
//! `base64(nonce || ciphertext)`, so each encryption of the same plaintext
//! yields a different string.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{AppError, AppResult};

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Build a cipher from a base64-encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> AppResult<Self> {
        let key_bytes = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Crypto(format!("Encryption key is not valid base64: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(AppError::Crypto(format!(
                "Encryption key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> AppResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Crypto(format!("Encryption failed: {}", e)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> AppResult<String> {
        let data = BASE64
            .decode(encoded)
            .map_err(|e| AppError::Crypto(format!("Ciphertext is not valid base64: {}", e)))?;

        if data.len() < NONCE_LEN {
            return Err(AppError::Crypto("Ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Crypto(format!("Decrypted data is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = CredentialCipher::from_base64_key(&test_key()).unwrap();
        let ciphertext = cipher.encrypt("account-secret").unwrap();
        assert_ne!(ciphertext, "account-secret");
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), "account-secret");
    }

    #[test]
    fn same_plaintext_yields_different_ciphertexts() {
        let cipher = CredentialCipher::from_base64_key(&test_key()).unwrap();
        let a = cipher.encrypt("secret").unwrap();
        let b = cipher.encrypt("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let cipher = CredentialCipher::from_base64_key(&test_key()).unwrap();
        let other = CredentialCipher::from_base64_key(&BASE64.encode([9u8; 32])).unwrap();
        let ciphertext = cipher.encrypt("secret").unwrap();
        assert!(other.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn rejects_short_keys() {
        let short = BASE64.encode([1u8; 16]);
        assert!(CredentialCipher::from_base64_key(&short).is_err());
    }
}
