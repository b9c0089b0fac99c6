//! AES-256-GCM encryption/decryption
//!
//! Provides authenticated encryption for credentials stored in the settings
//! file. Each encryption operation generates a unique nonce.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{ArcsyncError, ArcsyncResult};

use super::key_derivation::{machine_key, DerivedKey};
use super::SecureString;

/// Size of the AES-GCM nonce in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Encrypted data with associated metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// The nonce used for this encryption (base64 encoded)
    pub nonce: String,
    /// The encrypted ciphertext with authentication tag (base64 encoded)
    pub ciphertext: String,
    /// Version for future algorithm upgrades
    #[serde(default = "default_version")]
    pub version: u8,
}

fn default_version() -> u8 {
    1
}

impl EncryptedData {
    fn new(nonce: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
            version: 1,
        }
    }

    fn decode_nonce(&self) -> ArcsyncResult<Vec<u8>> {
        STANDARD
            .decode(&self.nonce)
            .map_err(|e| ArcsyncError::Encryption(format!("Invalid nonce encoding: {}", e)))
    }

    fn decode_ciphertext(&self) -> ArcsyncResult<Vec<u8>> {
        STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| ArcsyncError::Encryption(format!("Invalid ciphertext encoding: {}", e)))
    }
}

/// Encrypt plaintext data using AES-256-GCM
pub fn encrypt(plaintext: &[u8], key: &DerivedKey) -> ArcsyncResult<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ArcsyncError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| ArcsyncError::Encryption(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedData::new(&nonce_bytes, &ciphertext))
}

/// Decrypt ciphertext using AES-256-GCM
pub fn decrypt(encrypted: &EncryptedData, key: &DerivedKey) -> ArcsyncResult<Vec<u8>> {
    if encrypted.version != 1 {
        return Err(ArcsyncError::Encryption(format!(
            "Unsupported encryption version: {}",
            encrypted.version
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| ArcsyncError::Encryption(format!("Failed to create cipher: {}", e)))?;

    let nonce_bytes = encrypted.decode_nonce()?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(ArcsyncError::Encryption(format!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = encrypted.decode_ciphertext()?;

    cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| {
        ArcsyncError::Encryption(
            "Decryption failed: secret was protected on another machine or is corrupted"
                .to_string(),
        )
    })
}

/// Encrypt a secret string with the given key
pub fn protect_with(secret: &str, key: &DerivedKey) -> ArcsyncResult<EncryptedData> {
    encrypt(secret.as_bytes(), key)
}

/// Decrypt a secret string with the given key
pub fn unprotect_with(encrypted: &EncryptedData, key: &DerivedKey) -> ArcsyncResult<SecureString> {
    let plaintext = decrypt(encrypted, key)?;
    String::from_utf8(plaintext)
        .map(SecureString::from)
        .map_err(|e| ArcsyncError::Encryption(format!("Invalid UTF-8 in decrypted data: {}", e)))
}

/// Protect a secret with this machine's key
pub fn protect(secret: &str) -> ArcsyncResult<EncryptedData> {
    protect_with(secret, &machine_key()?)
}

/// Recover a secret protected on this machine
pub fn unprotect(encrypted: &EncryptedData) -> ArcsyncResult<SecureString> {
    unprotect_with(encrypted, &machine_key()?)
}
