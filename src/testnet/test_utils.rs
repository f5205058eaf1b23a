//! Test utilities for ledger and node tests

use crate::core::{
    Action, Block, Blockchain, CancelToken, ConsensusParams, Miner, RewardSchedule, Transaction,
    DEFAULT_BLOCK_REWARD,
};
use crate::error::Result;
use crate::storage::encrypted::KdfParams;
use crate::wallet::Identity;
use tempfile::TempDir;

pub const TEST_PASSPHRASE: &str = "correct horse battery staple";

/// Low enough that a block is found in a handful of attempts
pub const TEST_DIFFICULTY: u32 = 4;

/// Argon2 cost that keeps key derivation in the microseconds
pub fn test_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
    }
}

pub fn test_identity() -> Identity {
    Identity::create_with_params(TEST_PASSPHRASE, test_kdf()).expect("identity creation")
}

pub fn test_params() -> ConsensusParams {
    ConsensusParams {
        difficulty_bits: TEST_DIFFICULTY,
        reward: RewardSchedule::Fixed(DEFAULT_BLOCK_REWARD),
    }
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(tempfile::tempdir()?)
}

/// Run the miner on `block` until it is solved
pub fn solve(block: Block, difficulty_bits: u32) -> Block {
    let mut miner = Miner::new(
        crate::core::ProofOfWork::new(difficulty_bits),
        CancelToken::new(),
    );
    miner.set_template(block);
    miner
        .work()
        .expect("mining failed")
        .expect("mining was cancelled")
}

/// Solved block on top of the chain's head carrying `transactions`
pub fn mine_on(chain: &Blockchain, solver: &str, transactions: Vec<Transaction>) -> Block {
    let mut block = chain.new_block_template(solver).expect("template");
    for tx in transactions {
        chain.add_transaction(&mut block, tx).expect("add transaction");
    }
    solve(block, chain.proof_of_work().difficulty())
}

/// Transaction from `from` signed with the test passphrase
pub fn signed(from: &Identity, to: &str, action: Action) -> Transaction {
    let mut tx = Transaction::new(Some(from.address().to_string()), to.to_string(), action)
        .expect("transaction");
    tx.sign(from, TEST_PASSPHRASE).expect("signing");
    tx
}
