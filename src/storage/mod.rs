//! Data storage and persistence
//!
//! JSON files for the identity, chain and peer list, the encrypted key
//! material inside the identity, and the in-memory cache of transactions
//! waiting to be mined.

pub mod encrypted;
pub mod persistence;
pub mod tx_cache;

pub use encrypted::{derive_key, KdfParams};
pub use persistence::{load_chain, load_json, load_or_init, save_chain, save_json};
pub use tx_cache::TransactionCache;
