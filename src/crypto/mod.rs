//! Credential protection for arcsync
//!
//! Provides AES-256-GCM encryption with a machine-bound Argon2id key for the
//! passwords kept in the settings file.

pub mod encryption;
pub mod key_derivation;
pub mod secure_memory;

pub use encryption::{decrypt, encrypt, protect, protect_with, unprotect, unprotect_with, EncryptedData};
pub use key_derivation::{derive_key, machine_identity, machine_key, DerivedKey};
pub use secure_memory::SecureString;
