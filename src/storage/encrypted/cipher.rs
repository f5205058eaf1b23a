use crate::error::{BlockchainError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use zeroize::ZeroizeOnDrop;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Result of encryption operation
#[derive(Debug, Clone)]
pub struct EncryptionResult {
    /// Encrypted data with the authentication tag appended
    pub ciphertext: Vec<u8>,
    /// Nonce used for encryption
    pub nonce: Vec<u8>,
}

/// Secure key wrapper that automatically zeros memory on drop
#[derive(Clone, ZeroizeOnDrop)]
pub struct SecureKey {
    key: Vec<u8>,
}

impl SecureKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Get key bytes (use carefully)
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureKey")
            .field("length", &self.key.len())
            .finish()
    }
}

/// AES-256-GCM cipher protecting the identity's private key
pub struct Aes256GcmCipher {
    cipher: Aes256Gcm,
}

impl Aes256GcmCipher {
    pub fn new(key: &SecureKey) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(BlockchainError::Encryption(
                "AES-256-GCM requires a 32-byte key".to_string(),
            ));
        }

        let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
        Ok(Self {
            cipher: Aes256Gcm::new(aes_key),
        })
    }

    /// Encrypt data with a random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptionResult> {
        let nonce_bytes = crate::storage::encrypted::generate_random_bytes(NONCE_LEN);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self.cipher.encrypt(nonce, plaintext).map_err(|e| {
            BlockchainError::Encryption(format!("AES-256-GCM encryption failed: {e}"))
        })?;

        Ok(EncryptionResult {
            ciphertext,
            nonce: nonce_bytes,
        })
    }

    /// Decrypt data with the given nonce. Fails when the tag does not verify,
    /// which is how a wrong passphrase shows up.
    pub fn decrypt(&self, ciphertext: &[u8], nonce_bytes: &[u8]) -> Result<Vec<u8>> {
        if nonce_bytes.len() != NONCE_LEN {
            return Err(BlockchainError::Encryption(
                "AES-256-GCM requires a 12-byte nonce".to_string(),
            ));
        }

        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher.decrypt(nonce, ciphertext).map_err(|e| {
            BlockchainError::Encryption(format!("AES-256-GCM decryption failed: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_creation() {
        assert!(Aes256GcmCipher::new(&SecureKey::new(vec![0u8; 32])).is_ok());
        assert!(Aes256GcmCipher::new(&SecureKey::new(vec![0u8; 16])).is_err());
    }

    #[test]
    fn test_encryption_decryption() {
        let cipher = Aes256GcmCipher::new(&SecureKey::new(vec![1u8; 32])).unwrap();
        let plaintext = b"pkcs8 document bytes";

        let result = cipher.encrypt(plaintext).unwrap();
        assert_eq!(result.nonce.len(), 12);
        assert_ne!(result.ciphertext.as_slice(), plaintext.as_slice());

        let decrypted = cipher.decrypt(&result.ciphertext, &result.nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let cipher1 = Aes256GcmCipher::new(&SecureKey::new(vec![1u8; 32])).unwrap();
        let cipher2 = Aes256GcmCipher::new(&SecureKey::new(vec![2u8; 32])).unwrap();

        let result = cipher1.encrypt(b"secret").unwrap();
        assert!(cipher2.decrypt(&result.ciphertext, &result.nonce).is_err());
    }

    #[test]
    fn test_secure_key_debug_hides_material() {
        let key = SecureKey::new(vec![7u8; 32]);
        let printed = format!("{key:?}");
        assert!(printed.contains("length"));
        assert!(!printed.contains("[7"));
    }
}
