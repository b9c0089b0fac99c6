//! Machine-bound key derivation using Argon2id
//!
//! The key protecting stored credentials is derived from this machine's
//! identity and a fixed application salt, so a settings file copied to another
//! host cannot be decrypted there. This is obfuscation at rest, not a
//! substitute for real secret management: anyone who can run code on this
//! machine can derive the same key.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ArcsyncError, ArcsyncResult};

/// Fixed application salt mixed into every machine key
const APP_SALT: &[u8] = b"arcsync/credential-protection/v1";

/// Files consulted, in order, for a stable machine identifier
const MACHINE_ID_FILES: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Argon2 cost parameters. Derivation happens a few times per run, so these
/// stay modest.
const MEMORY_COST_KIB: u32 = 19_456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

/// A derived encryption key
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    /// The 32-byte key for AES-256
    key: [u8; 32],
}

impl DerivedKey {
    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Read this machine's identity string
///
/// Prefers the systemd/dbus machine id and falls back to the hostname.
pub fn machine_identity() -> ArcsyncResult<String> {
    for candidate in MACHINE_ID_FILES {
        if let Ok(contents) = std::fs::read_to_string(candidate) {
            let id = contents.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
    }

    let host = hostname::get()
        .map_err(|e| ArcsyncError::Encryption(format!("Cannot determine machine identity: {}", e)))?;
    Ok(host.to_string_lossy().into_owned())
}

/// Derive the credential key for this machine
pub fn machine_key() -> ArcsyncResult<DerivedKey> {
    derive_key(&machine_identity()?)
}

/// Derive a key from an identity string
pub fn derive_key(identity: &str) -> ArcsyncResult<DerivedKey> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(32))
        .map_err(|e| ArcsyncError::Encryption(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(identity.as_bytes(), APP_SALT, &mut key)
        .map_err(|e| ArcsyncError::Encryption(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey { key })
}
