// Canonical byte encoding used for every digest in the ledger.
// bincode's standard configuration is deterministic, so two nodes hashing the
// same fields always produce the same bytes.
use crate::error::{BlockchainError, Result};

/// Encode data with bincode 2.0 standard configuration
pub fn canonical_encode<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| BlockchainError::Serialization(format!("Canonical encoding failed: {e}")))
}

/// Digest of the canonical encoding, lowercase hex
pub fn canonical_digest<T: bincode::Encode>(data: &T) -> Result<String> {
    let bytes = canonical_encode(data)?;
    Ok(crate::utils::sha256_hex(&bytes))
}
