//! Passphrase protection for identity key material
//!
//! The private key is encrypted with AES-256-GCM under a key stretched from
//! the passphrase with Argon2id. Only key material needs protecting; chain
//! and peer data are public.

pub mod cipher;

pub use cipher::{Aes256GcmCipher, EncryptionResult, SecureKey};

use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

/// Salt length for key derivation
pub const SALT_LEN: usize = 32;

/// Argon2id cost parameters, stored next to the ciphertext so the key can be
/// re-derived later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
        }
    }
}

/// Stretch a passphrase into a 32-byte AES key
pub fn derive_key(passphrase: &str, salt: &[u8], params: KdfParams) -> Result<SecureKey> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(params.memory_kib, params.iterations, 1, Some(32))
        .map_err(|e| BlockchainError::Encryption(format!("Invalid Argon2 parameters: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = vec![0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| BlockchainError::Encryption(format!("Key derivation failed: {e}")))?;

    Ok(SecureKey::new(key))
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(length: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
