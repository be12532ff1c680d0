//! Payload encryption capability.
//!
//! Encrypted worker requests carry the target as an opaque `data` parameter.
//! The engine only depends on the `Cipher` / `CipherProvider` traits; the
//! built-in implementation is AES-256-GCM with a SHA-256 derived key.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::future::BoxFuture;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Errors from loading or using a cipher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The capability could not be loaded.
    #[error("cipher unavailable: {0}")]
    Unavailable(String),

    /// Encryption itself failed.
    #[error("encryption failed: {0}")]
    Encrypt(String),
}

/// Symmetric encryption with a passphrase.
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext` with `key`, returning a text-safe ciphertext.
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String, CipherError>;
}

/// Lazily loads a cipher. Called at most until the first success.
pub trait CipherProvider: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Cipher>, CipherError>>;
}

/// AES-256-GCM keyed by SHA-256 of the passphrase.
///
/// Output is base64 of `nonce || ciphertext || tag`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    fn cipher_for(key: &str) -> Aes256Gcm {
        let digest = Sha256::digest(key.as_bytes());
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest))
    }

    /// Inverse of `encrypt`. Returns `None` on any malformed or forged input.
    pub fn decrypt(&self, encoded: &str, key: &str) -> Option<String> {
        let combined = BASE64.decode(encoded).ok()?;
        if combined.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = Self::cipher_for(key)
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str, key: &str) -> Result<String, CipherError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = Self::cipher_for(key)
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }
}

/// Provider that hands out the built-in AES-GCM cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCipherProvider;

impl CipherProvider for BuiltinCipherProvider {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Cipher>, CipherError>> {
        Box::pin(async { Ok(Arc::new(AesGcmCipher) as Arc<dyn Cipher>) })
    }
}

/// Provider that always fails. Forces simple mode.
#[derive(Debug, Clone, Default)]
pub struct UnavailableCipherProvider {
    pub reason: String,
}

impl CipherProvider for UnavailableCipherProvider {
    fn load(&self) -> BoxFuture<'_, Result<Arc<dyn Cipher>, CipherError>> {
        let reason = self.reason.clone();
        Box::pin(async move { Err(CipherError::Unavailable(reason)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = AesGcmCipher;
        let encrypted = cipher.encrypt(r#"{"url":"https://hdrezka.tv/"}"#, "secret").unwrap();

        assert_eq!(
            cipher.decrypt(&encrypted, "secret").as_deref(),
            Some(r#"{"url":"https://hdrezka.tv/"}"#)
        );
        assert!(cipher.decrypt(&encrypted, "other-key").is_none());
        assert!(cipher.decrypt("%%%", "secret").is_none());
    }

    #[test]
    fn test_unique_ciphertexts() {
        let cipher = AesGcmCipher;
        assert_ne!(
            cipher.encrypt("data", "k").unwrap(),
            cipher.encrypt("data", "k").unwrap()
        );
    }

    #[tokio::test]
    async fn test_providers() {
        assert!(BuiltinCipherProvider.load().await.is_ok());
        let failing = UnavailableCipherProvider { reason: "offline".into() };
        assert_eq!(
            failing.load().await.err(),
            Some(CipherError::Unavailable("offline".into()))
        );
    }
}
