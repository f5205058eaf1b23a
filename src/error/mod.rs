//! Error handling for the node
//!
//! One error type for every layer: identity, ledger validation, gossip and
//! persistence. Validation failures carry the closed [`BlockCheck`] reason.

use crate::core::BlockCheck;
use std::fmt;

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for node operations
#[derive(Debug, Clone)]
pub enum BlockchainError {
    /// Passphrase does not unlock the stored private key
    Auth,
    /// A block or transaction failed consensus rules
    Rejected(BlockCheck),
    /// A peer could not be reached or written to
    Network(String),
    /// Inbound payload could not be decoded into a gossip message
    MalformedMessage(String),
    /// Identity, chain or peer file is unusable
    CorruptState(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Encryption/decryption errors
    Encryption(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// Address is not a hex encoded public key
    InvalidAddress(String),
    /// Transaction construction errors
    Transaction(String),
    /// Mining errors
    Mining(String),
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Auth => write!(f, "Authentication error: invalid passphrase"),
            BlockchainError::Rejected(check) => write!(f, "Validation rejected: {check}"),
            BlockchainError::Network(msg) => write!(f, "Network error: {msg}"),
            BlockchainError::MalformedMessage(msg) => write!(f, "Malformed message: {msg}"),
            BlockchainError::CorruptState(msg) => write!(f, "Corrupt state: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Encryption(msg) => write!(f, "Encryption error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

impl From<BlockCheck> for BlockchainError {
    fn from(check: BlockCheck) -> Self {
        BlockchainError::Rejected(check)
    }
}
