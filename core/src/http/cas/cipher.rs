//! Symmetric cipher for proxy-granting tickets at rest.
//!
//! The algorithm is selected by a configured name and the key is supplied
//! base64-encoded; both are checked at startup. The wire format is
//! `base64(nonce || ciphertext)` with a fresh random nonce per encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::prelude::*;
use rand::RngCore;

use crate::http::error::CasError;

/// AES-GCM nonce size in bytes.
const NONCE_SIZE: usize = 12;

/// Supported cipher algorithms, resolved by name at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
}

impl CipherAlgorithm {
    pub fn from_name(name: &str) -> Result<Self, CasError> {
        match name.to_ascii_lowercase().as_str() {
            "aes-128-gcm" => Ok(CipherAlgorithm::Aes128Gcm),
            "aes-256-gcm" => Ok(CipherAlgorithm::Aes256Gcm),
            other => Err(CasError::configuration(format!(
                "unknown cipherAlgorithm [{}]; expected aes-128-gcm or aes-256-gcm",
                other
            ))),
        }
    }

    fn key_len(&self) -> usize {
        match self {
            CipherAlgorithm::Aes128Gcm => 16,
            CipherAlgorithm::Aes256Gcm => 32,
        }
    }
}

enum CipherKind {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// A configured symmetric cipher.
pub struct CasCipher {
    kind: CipherKind,
}

impl CasCipher {
    /// A missing, malformed or wrong-sized key is a configuration error.
    pub fn new(algorithm: CipherAlgorithm, base64_key: &str) -> Result<Self, CasError> {
        let key = BASE64_STANDARD
            .decode(base64_key)
            .map_err(|e| CasError::configuration(format!("secretKey is not valid base64: {}", e)))?;

        if key.len() != algorithm.key_len() {
            return Err(CasError::configuration(format!(
                "secretKey must be {} bytes for {:?}, got {}",
                algorithm.key_len(),
                algorithm,
                key.len()
            )));
        }

        let kind = match algorithm {
            CipherAlgorithm::Aes128Gcm => Aes128Gcm::new_from_slice(&key)
                .map(CipherKind::Aes128)
                .map_err(|e| CasError::configuration(format!("invalid secretKey: {}", e)))?,
            CipherAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(&key)
                .map(CipherKind::Aes256)
                .map_err(|e| CasError::configuration(format!("invalid secretKey: {}", e)))?,
        };

        Ok(CasCipher { kind })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CasError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = match &self.kind {
            CipherKind::Aes128(cipher) => cipher.encrypt(nonce, plaintext.as_bytes()),
            CipherKind::Aes256(cipher) => cipher.encrypt(nonce, plaintext.as_bytes()),
        }
        .map_err(|_| CasError::store_inconsistency("proxy-granting ticket encryption failed"))?;

        let mut envelope = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(envelope))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CasError> {
        let envelope = BASE64_STANDARD.decode(encoded).map_err(|_| {
            CasError::store_inconsistency("stored proxy-granting ticket is not valid base64")
        })?;

        if envelope.len() < NONCE_SIZE {
            return Err(CasError::store_inconsistency(
                "stored proxy-granting ticket is truncated",
            ));
        }

        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = match &self.kind {
            CipherKind::Aes128(cipher) => cipher.decrypt(nonce, ciphertext),
            CipherKind::Aes256(cipher) => cipher.decrypt(nonce, ciphertext),
        }
        .map_err(|_| CasError::store_inconsistency("proxy-granting ticket decryption failed"))?;

        String::from_utf8(plaintext).map_err(|_| {
            CasError::store_inconsistency("decrypted proxy-granting ticket is not UTF-8")
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
