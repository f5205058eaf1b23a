//! Core ledger functionality
//!
//! Transactions and blocks with their hashing rules, the chain store that
//! validates and orders them, and the proof-of-work search that produces new
//! blocks.

pub mod block;
pub mod blockchain;
pub mod miner;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, BlockRecord, Proof};
pub use blockchain::{
    BlockCheck, Blockchain, ChainRecord, ConsensusParams, CHAIN_VERSION, DEFAULT_DIFFICULTY_BITS,
};
pub use miner::{CancelToken, Miner, DEFAULT_BATCH_SIZE};
pub use monetary::{format_amount, RewardSchedule, DEFAULT_BLOCK_REWARD};
pub use proof_of_work::{ProofOfWork, MAX_DIFFICULTY_BITS};
pub use transaction::{Action, Address, Digest, Signature, Transaction, TransactionCheck};
