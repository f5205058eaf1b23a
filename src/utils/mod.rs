//! Utility functions and helpers
//!
//! Hashing, signatures, hex encoding and the canonical byte encoding that
//! every ledger digest is computed over.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, hex_decode, hex_encode,
    new_key_pair, public_key_from_pkcs8, sha256_digest, sha256_hex, DIGEST_LEN,
};

pub use serialization::{canonical_digest, canonical_encode};
