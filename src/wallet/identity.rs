use crate::core::{Address, Signature};
use crate::error::{BlockchainError, Result};
use crate::storage::encrypted::{
    derive_key, generate_random_bytes, Aes256GcmCipher, KdfParams, SALT_LEN,
};
use crate::utils::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode, hex_encode,
    new_key_pair, public_key_from_pkcs8,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Uncompressed P-256 public key length
pub const PUBLIC_KEY_LEN: usize = 65;
const UNCOMPRESSED_TAG: u8 = 0x04;

/// The local user's key pair. The public key is the account address; the
/// private key only exists encrypted under the passphrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    public_key: Address,
    kdf: KdfParams,
    salt: String,
    nonce: String,
    ciphertext: String,
}

impl Identity {
    pub fn create(passphrase: &str) -> Result<Identity> {
        Self::create_with_params(passphrase, KdfParams::default())
    }

    pub fn create_with_params(passphrase: &str, kdf: KdfParams) -> Result<Identity> {
        let pkcs8 = Zeroizing::new(new_key_pair()?);
        let public_key = public_key_from_pkcs8(&pkcs8)?;

        let salt = generate_random_bytes(SALT_LEN);
        let key = derive_key(passphrase, &salt, kdf)?;
        let sealed = Aes256GcmCipher::new(&key)?.encrypt(&pkcs8)?;

        log::info!("Created identity {}", short(&hex_encode(&public_key)));
        Ok(Identity {
            public_key: hex_encode(&public_key),
            kdf,
            salt: hex_encode(&salt),
            nonce: hex_encode(&sealed.nonce),
            ciphertext: hex_encode(&sealed.ciphertext),
        })
    }

    /// Account address of this identity
    pub fn address(&self) -> &str {
        &self.public_key
    }

    pub fn check_passphrase(&self, candidate: &str) -> bool {
        self.unlock(candidate).is_ok()
    }

    /// Sign a hex digest. Fails with [`BlockchainError::Auth`] when the
    /// passphrase does not unlock the private key.
    pub fn sign(&self, digest: &str, passphrase: &str) -> Result<Signature> {
        let pkcs8 = self.unlock(passphrase)?;
        let message = hex_decode(digest)?;
        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, &message)?;
        Ok(hex_encode(&signature))
    }

    fn unlock(&self, passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
        let salt = hex_decode(&self.salt)?;
        let nonce = hex_decode(&self.nonce)?;
        let ciphertext = hex_decode(&self.ciphertext)?;

        let key = derive_key(passphrase, &salt, self.kdf)?;
        let pkcs8 = Aes256GcmCipher::new(&key)?
            .decrypt(&ciphertext, &nonce)
            .map(Zeroizing::new)
            .map_err(|_| BlockchainError::Auth)?;

        // a file edited by hand could pair a key with someone else's address
        if public_key_from_pkcs8(&pkcs8)? != hex_decode(&self.public_key)? {
            return Err(BlockchainError::CorruptState(
                "identity public key does not match its private key".to_string(),
            ));
        }
        Ok(pkcs8)
    }
}

/// An address is a lowercase hex uncompressed P-256 public key
pub fn validate_address(address: &str) -> bool {
    match hex_decode(address) {
        Ok(bytes) => bytes.len() == PUBLIC_KEY_LEN && bytes[0] == UNCOMPRESSED_TAG,
        Err(_) => false,
    }
}

/// Check `signature` over the hex `digest` against the key behind `address`
pub fn verify_signature(digest: &str, signature: &str, address: &str) -> bool {
    let (Ok(message), Ok(signature), Ok(public_key)) =
        (hex_decode(digest), hex_decode(signature), hex_decode(address))
    else {
        return false;
    };
    ecdsa_p256_sha256_sign_verify(&public_key, &signature, &message)
}

/// First twelve characters of a hex string, for log lines
pub fn short(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::sha256_hex;

    fn cheap() -> KdfParams {
        KdfParams {
            memory_kib: 64,
            iterations: 1,
        }
    }

    #[test]
    fn test_create_and_check_passphrase() {
        let identity = Identity::create_with_params("correct horse", cheap()).unwrap();

        assert!(validate_address(identity.address()));
        assert!(identity.check_passphrase("correct horse"));
        assert!(!identity.check_passphrase("battery staple"));
    }

    #[test]
    fn test_sign_verifies_against_address() {
        let identity = Identity::create_with_params("pw", cheap()).unwrap();
        let digest = sha256_hex(b"payload");

        let signature = identity.sign(&digest, "pw").unwrap();
        assert!(verify_signature(&digest, &signature, identity.address()));

        let other = sha256_hex(b"other payload");
        assert!(!verify_signature(&other, &signature, identity.address()));
    }

    #[test]
    fn test_sign_with_wrong_passphrase_is_auth_error() {
        let identity = Identity::create_with_params("pw", cheap()).unwrap();
        let digest = sha256_hex(b"payload");

        match identity.sign(&digest, "nope") {
            Err(BlockchainError::Auth) => {}
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_identity_file_round_trip() {
        let identity = Identity::create_with_params("pw", cheap()).unwrap();
        let json = serde_json::to_string(&identity).unwrap();
        let restored: Identity = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, identity);
        assert!(restored.check_passphrase("pw"));
    }

    #[test]
    fn test_validate_address() {
        assert!(!validate_address("not hex"));
        assert!(!validate_address(&"00".repeat(PUBLIC_KEY_LEN)));
        assert!(!validate_address(&format!("04{}", "11".repeat(10))));
        assert!(validate_address(&format!("04{}", "11".repeat(64))));
    }

    #[test]
    fn test_verify_signature_rejects_garbage() {
        assert!(!verify_signature("zz", "00", "04"));
    }
}
