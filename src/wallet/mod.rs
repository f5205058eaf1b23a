//! Crypto identity
//!
//! Key pair creation, passphrase checks, signing and signature verification.
//! Nothing in here knows about the chain or the network.

pub mod identity;

pub use identity::{short, validate_address, verify_signature, Identity, PUBLIC_KEY_LEN};
