//! Credential encryption for stored municipal integration secrets.
//!
//! The engine never persists NFS-e passwords or tokens in plaintext: callers
//! hand plaintext to a [`SecretCipher`] and store only the opaque ciphertext.
//! The stored format is base64(nonce || AES-256-GCM ciphertext).

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Placeholder returned in place of stored secrets on every read path.
pub const MASKED_SECRET: &str = "••••••••";

/// Encrypt/decrypt capability for tenant credentials.
///
/// The engine treats ciphertext as opaque; swapping the implementation (KMS,
/// HSM) must not require engine changes.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, AppError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, AppError>;
}

/// AES-256-GCM cipher keyed from a master secret.
pub struct AesGcmCipher {
    key: Key<Aes256Gcm>,
}

impl AesGcmCipher {
    /// Derives the AES key as SHA-256 of the configured master key string.
    pub fn new(master_key: &Secret<String>) -> Self {
        let digest = Sha256::digest(master_key.expose_secret().as_bytes());
        Self {
            key: *Key::<Aes256Gcm>::from_slice(&digest),
        }
    }
}

impl SecretCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Failed to encrypt secret")))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, AppError> {
        let combined = BASE64
            .decode(ciphertext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Malformed stored secret")))?;
        if combined.len() < 12 {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Malformed stored secret"
            )));
        }

        let (nonce_bytes, payload) = combined.split_at(12);
        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), payload)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Failed to decrypt secret")))?;

        String::from_utf8(plaintext)
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Stored secret is not UTF-8")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> AesGcmCipher {
        AesGcmCipher::new(&Secret::new("test-master-key".to_string()))
    }

    #[test]
    fn encrypt_produces_opaque_ciphertext() {
        let c = cipher();
        let encrypted = c.encrypt("municipal-password").unwrap();
        assert!(!encrypted.contains("municipal-password"));
        assert_eq!(c.decrypt(&encrypted).unwrap(), "municipal-password");
    }

    #[test]
    fn decrypt_rejects_garbage() {
        let c = cipher();
        assert!(c.decrypt("not-base64!!!").is_err());
        assert!(c.decrypt("YWJj").is_err()); // too short for a nonce
    }

    #[test]
    fn ciphers_with_different_keys_do_not_interoperate() {
        let a = AesGcmCipher::new(&Secret::new("key-a".to_string()));
        let b = AesGcmCipher::new(&Secret::new("key-b".to_string()));
        let encrypted = a.encrypt("token").unwrap();
        assert!(b.decrypt(&encrypted).is_err());
    }
}
