//! Blockchain integration tests
//!
//! Drives the public API end to end: identities sign, the miner solves,
//! the chain store validates and the chain file survives a reload.

use picocoin::core::{
    Action, Block, BlockCheck, Blockchain, CancelToken, ConsensusParams, Miner, RewardSchedule,
    Transaction,
};
use picocoin::storage::{load_chain, save_chain, KdfParams};
use picocoin::{BlockchainError, Identity};
use tempfile::tempdir;

const PASSPHRASE: &str = "integration";

fn identity() -> Identity {
    let kdf = KdfParams {
        memory_kib: 64,
        iterations: 1,
    };
    Identity::create_with_params(PASSPHRASE, kdf).unwrap()
}

fn params() -> ConsensusParams {
    ConsensusParams {
        difficulty_bits: 4,
        reward: RewardSchedule::Fixed(100),
    }
}

fn mine(chain: &Blockchain, solver: &Identity, transactions: Vec<Transaction>) -> Block {
    let mut template = chain.new_block_template(solver.address()).unwrap();
    for tx in transactions {
        chain.add_transaction(&mut template, tx).unwrap();
    }
    let mut miner = Miner::new(chain.proof_of_work().clone(), CancelToken::new());
    miner.set_template(template);
    miner.work().unwrap().unwrap()
}

fn payment(from: &Identity, to: &Identity, amount: u64) -> Transaction {
    let mut tx = Transaction::new(
        Some(from.address().to_string()),
        to.address().to_string(),
        Action::Payment { amount },
    )
    .unwrap();
    tx.sign(from, PASSPHRASE).unwrap();
    tx
}

#[test]
fn test_mine_reward_and_pay() {
    let alice = identity();
    let bob = identity();
    let mut chain = Blockchain::new(params());

    let genesis = mine(&chain, &alice, vec![]);
    let genesis_hash = genesis.get_hash().to_string();
    assert!(chain.append(genesis).unwrap());
    assert_eq!(chain.height(), Some(0));

    let reward =
        Transaction::reward(alice.address().to_string(), 100, genesis_hash.clone()).unwrap();
    let block = mine(&chain, &alice, vec![reward]);
    assert!(chain.append(block).unwrap());
    assert_eq!(chain.balance_of(alice.address()), 100);
    assert_eq!(chain.confirmation_depth(&genesis_hash), 1);

    let block = mine(&chain, &bob, vec![payment(&alice, &bob, 30)]);
    assert!(chain.append(block).unwrap());
    assert_eq!(chain.balance_of(alice.address()), 70);
    assert_eq!(chain.balance_of(bob.address()), 30);
    assert_eq!(chain.height(), Some(2));
}

#[test]
fn test_overdraft_block_is_rejected() {
    let alice = identity();
    let bob = identity();
    let mut chain = Blockchain::new(params());
    chain.append(mine(&chain, &alice, vec![])).unwrap();

    let block = mine(&chain, &alice, vec![payment(&alice, &bob, 1)]);
    assert!(matches!(
        chain.validate(&block),
        BlockCheck::InvalidTransaction { index: 0, .. }
    ));
    assert!(matches!(
        chain.append(block),
        Err(BlockchainError::Rejected(_))
    ));
    assert_eq!(chain.height(), Some(0));
}

#[test]
fn test_chain_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blockchain.json");
    let alice = identity();

    // a missing file starts an empty chain
    let mut chain = load_chain(&path, params()).unwrap();
    assert!(chain.is_empty());

    let genesis = mine(&chain, &alice, vec![]);
    let reward =
        Transaction::reward(alice.address().to_string(), 100, genesis.get_hash().to_string())
            .unwrap();
    chain.append(genesis).unwrap();
    chain.append(mine(&chain, &alice, vec![reward])).unwrap();
    save_chain(&path, &chain).unwrap();

    let reloaded = load_chain(&path, params()).unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.head_hash(), chain.head_hash());
    assert_eq!(reloaded.balance_of(alice.address()), 100);
}

#[test]
fn test_corrupt_chain_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blockchain.json");
    std::fs::write(&path, "{\"ver\": \"0.1\", \"blocks\": ").unwrap();

    assert!(matches!(
        load_chain(&path, params()),
        Err(BlockchainError::CorruptState(_))
    ));
}

#[test]
fn test_cancelled_miner_gives_up() {
    let alice = identity();
    let chain = Blockchain::new(ConsensusParams {
        difficulty_bits: 64,
        reward: RewardSchedule::Fixed(100),
    });
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut miner = Miner::new(chain.proof_of_work().clone(), cancel);
    miner.set_template(chain.new_block_template(alice.address()).unwrap());
    assert!(miner.work().unwrap().is_none());
}
