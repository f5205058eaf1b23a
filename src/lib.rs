//! # PicoCoin
//!
//! A minimal cryptocurrency node: it keeps a replica of the chain, relays
//! blocks, transactions and peer lists to every peer it knows, and can mine
//! new blocks for a reward.
//!
//! ## Layout
//! - `core/`: transactions, blocks, the chain store and proof-of-work mining
//! - `wallet/`: the local identity (key pair) and signature checks
//! - `network/`: peer set, gossip fan-out and the inbound server
//! - `node/`: the orchestrator that wires everything together
//! - `storage/`: JSON persistence, key encryption and the pending cache
//! - `config/`: settings from file, environment and flags
//! - `utils/`: hashing, signing and canonical encoding
//! - `cli/`: command-line flags
//!
//! Amounts are whole picocoins. Addresses are hex encoded P-256 public keys.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod node;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

pub use cli::Opt;
pub use config::Config;
pub use core::{
    Action, Block, BlockCheck, Blockchain, ConsensusParams, Miner, ProofOfWork, RewardSchedule,
    Transaction,
};
pub use error::{BlockchainError, Result};
pub use network::{Gossip, GossipMessage, GossipServer, Peer, PeerSet};
pub use node::{MiningState, Node};
pub use wallet::{validate_address, Identity};
