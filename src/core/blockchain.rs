// In-memory chain store: every known block keyed by hash, the head of the
// longest branch, and the consensus rules a block must pass to get in.
// Balances are never stored; they are replayed along a branch on demand.

use crate::core::{
    Action, Address, Block, BlockRecord, Digest, ProofOfWork, RewardSchedule, Transaction,
    TransactionCheck,
};
use crate::error::{BlockchainError, Result};
use crate::wallet::short;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Version tag written into chain files
pub const CHAIN_VERSION: &str = "0.1";

/// Default number of leading zero bits a block hash needs
pub const DEFAULT_DIFFICULTY_BITS: u32 = 20;

/// Rules every node on a network must agree on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusParams {
    pub difficulty_bits: u32,
    pub reward: RewardSchedule,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        ConsensusParams {
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            reward: RewardSchedule::default(),
        }
    }
}

/// Outcome of validating a block against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCheck {
    Ok,
    Duplicate,
    HashMismatch,
    InsufficientWork,
    UnknownPrevious,
    GenesisExists,
    InvalidTransaction {
        index: usize,
        reason: TransactionCheck,
    },
}

impl BlockCheck {
    pub fn is_ok(&self) -> bool {
        *self == BlockCheck::Ok
    }
}

impl fmt::Display for BlockCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockCheck::Ok => write!(f, "accepted"),
            BlockCheck::Duplicate => write!(f, "block already known"),
            BlockCheck::HashMismatch => write!(f, "hash does not match contents"),
            BlockCheck::InsufficientWork => write!(f, "hash does not meet the difficulty target"),
            BlockCheck::UnknownPrevious => write!(f, "previous block unknown"),
            BlockCheck::GenesisExists => write!(f, "chain already has a genesis block"),
            BlockCheck::InvalidTransaction { index, reason } => {
                write!(f, "transaction {index} invalid: {reason}")
            }
        }
    }
}

/// Chain file shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRecord {
    pub ver: String,
    pub blocks: BTreeMap<Digest, BlockRecord>,
    pub hash: Option<Digest>,
}

/// Account state of one branch, replayed from genesis
#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<Address, u64>,
    included: HashSet<Digest>,
    rewarded: HashSet<Digest>,
    ancestors: HashSet<Digest>,
}

impl Ledger {
    fn balance(&self, address: &str) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    fn check(
        &self,
        chain: &Blockchain,
        tx: &Transaction,
    ) -> std::result::Result<(), TransactionCheck> {
        tx.check_well_formed()?;

        match tx.action() {
            Action::Reward { amount, block } => {
                if !self.ancestors.contains(block) {
                    return Err(TransactionCheck::RewardUnknownBlock);
                }
                if self.rewarded.contains(block) {
                    return Err(TransactionCheck::RewardAlreadyClaimed);
                }
                let rewarded = chain
                    .blocks
                    .get(block)
                    .ok_or(TransactionCheck::RewardUnknownBlock)?;
                if rewarded.get_solver() != tx.to_address() {
                    return Err(TransactionCheck::RewardWrongSolver);
                }
                let height = chain
                    .heights
                    .get(block)
                    .copied()
                    .ok_or(TransactionCheck::RewardUnknownBlock)?;
                if *amount != chain.reward.reward_at(height) {
                    return Err(TransactionCheck::RewardWrongAmount);
                }
            }
            Action::Payment { amount } => {
                let from = tx.from_address().ok_or(TransactionCheck::MissingSender)?;
                if self.balance(from) < *amount {
                    return Err(TransactionCheck::InsufficientFunds);
                }
            }
            Action::Invoice { .. } | Action::Message { .. } => {}
        }

        if self.included.contains(tx.hash()) {
            return Err(TransactionCheck::AlreadyIncluded);
        }
        Ok(())
    }

    fn apply(&mut self, tx: &Transaction) {
        let amount = tx.action().transferred();
        if amount > 0 {
            if let Some(from) = tx.from_address() {
                let balance = self.balances.entry(from.to_string()).or_default();
                *balance = balance.saturating_sub(amount);
            }
            let balance = self.balances.entry(tx.to_address().to_string()).or_default();
            *balance = balance.saturating_add(amount);
        }
        if let Action::Reward { block, .. } = tx.action() {
            self.rewarded.insert(block.clone());
        }
        self.included.insert(tx.hash().to_string());
    }

    fn apply_block(&mut self, block: &Block) {
        for tx in block.get_transactions() {
            self.apply(tx);
        }
        self.ancestors.insert(block.get_hash().to_string());
    }
}

#[derive(Debug, Clone)]
pub struct Blockchain {
    version: String,
    blocks: HashMap<Digest, Block>,
    heights: HashMap<Digest, u64>,
    head_hash: Option<Digest>,
    pow: ProofOfWork,
    reward: RewardSchedule,
}

impl Blockchain {
    pub fn new(params: ConsensusParams) -> Blockchain {
        Blockchain {
            version: CHAIN_VERSION.to_string(),
            blocks: HashMap::new(),
            heights: HashMap::new(),
            head_hash: None,
            pow: ProofOfWork::new(params.difficulty_bits),
            reward: params.reward,
        }
    }

    /// Check a block against the store without changing it. Checks run in a
    /// fixed order and the first failure is reported.
    pub fn validate(&self, block: &Block) -> BlockCheck {
        if self.blocks.contains_key(block.get_hash()) {
            return BlockCheck::Duplicate;
        }
        match block.compute_hash() {
            Ok(hash) if hash == block.get_hash() => {}
            _ => return BlockCheck::HashMismatch,
        }
        if !self.pow.meets_target(block.get_hash()) {
            return BlockCheck::InsufficientWork;
        }
        match block.get_previous_hash() {
            None if !self.blocks.is_empty() => return BlockCheck::GenesisExists,
            Some(previous) if !self.blocks.contains_key(previous) => {
                return BlockCheck::UnknownPrevious
            }
            _ => {}
        }

        let mut ledger = self.ledger(block.get_previous_hash());
        for (index, tx) in block.get_transactions().iter().enumerate() {
            if let Err(reason) = ledger.check(self, tx) {
                return BlockCheck::InvalidTransaction { index, reason };
            }
            ledger.apply(tx);
        }
        BlockCheck::Ok
    }

    /// Store a valid block. Returns `false` when the block was already known;
    /// a block on a competing branch is stored and counts as a change even if
    /// the head stays where it is.
    pub fn append(&mut self, block: Block) -> Result<bool> {
        match self.validate(&block) {
            BlockCheck::Ok => {}
            BlockCheck::Duplicate => return Ok(false),
            check => return Err(BlockchainError::Rejected(check)),
        }

        let height = match block.get_previous_hash() {
            Some(previous) => self.heights.get(previous).map_or(0, |h| h + 1),
            None => 0,
        };
        let hash = block.get_hash().to_string();

        // ties keep the head seen first
        let becomes_head = match self.height() {
            Some(head_height) => height > head_height,
            None => true,
        };

        self.heights.insert(hash.clone(), height);
        self.blocks.insert(hash.clone(), block);
        if becomes_head {
            info!("New head {} at height {height}", short(&hash));
            self.head_hash = Some(hash);
        } else {
            debug!("Stored side block {} at height {height}", short(&hash));
        }
        Ok(true)
    }

    /// Blocks mined on top of `hash` along the main chain; zero for unknown
    /// blocks and blocks off the main chain.
    pub fn confirmation_depth(&self, hash: &str) -> u64 {
        let (Some(height), Some(head_height)) = (self.heights.get(hash).copied(), self.height())
        else {
            return 0;
        };
        match self.main_chain_at(height) {
            Some(main) if main == hash => head_height - height,
            _ => 0,
        }
    }

    /// Unmined block on top of the current head
    pub fn new_block_template(&self, solver_address: &str) -> Result<Block> {
        Block::template(self.head_hash.clone(), solver_address.to_string())
    }

    /// Append to a template without any checks; the whole block is validated
    /// once it is solved.
    pub fn add_transaction(&self, block: &mut Block, transaction: Transaction) -> Result<()> {
        block.push_transaction(transaction)
    }

    /// Reward for the next block on top of the head
    pub fn current_reward(&self) -> u64 {
        self.reward.reward_at(self.height().map_or(0, |h| h + 1))
    }

    /// Reward a block earns, judged by where it sits. `None` when its parent
    /// is unknown.
    pub fn reward_for(&self, block: &Block) -> Option<u64> {
        let height = match block.get_previous_hash() {
            Some(previous) => self.heights.get(previous)? + 1,
            None => 0,
        };
        Some(self.reward.reward_at(height))
    }

    /// Balance along the main chain
    pub fn balance_of(&self, address: &str) -> u64 {
        self.ledger(self.head_hash.as_deref()).balance(address)
    }

    /// Split candidates into the ones a block on top of `previous` could carry,
    /// in order, and the ones it could not together with the reason.
    pub fn filter_admissible(
        &self,
        previous: Option<&str>,
        candidates: Vec<Transaction>,
    ) -> (Vec<Transaction>, Vec<(Transaction, TransactionCheck)>) {
        let mut ledger = self.ledger(previous);
        let mut admissible = vec![];
        let mut rejected = vec![];

        for tx in candidates {
            match ledger.check(self, &tx) {
                Ok(()) => {
                    ledger.apply(&tx);
                    admissible.push(tx);
                }
                Err(reason) => rejected.push((tx, reason)),
            }
        }
        (admissible, rejected)
    }

    pub fn is_head(&self, hash: &str) -> bool {
        self.head_hash.as_deref() == Some(hash)
    }

    pub fn head_hash(&self) -> Option<&str> {
        self.head_hash.as_deref()
    }

    /// Height of the head, `None` for an empty chain
    pub fn height(&self) -> Option<u64> {
        self.head_hash
            .as_ref()
            .and_then(|hash| self.heights.get(hash).copied())
    }

    pub fn get_block(&self, hash: &str) -> Option<&Block> {
        self.blocks.get(hash)
    }

    pub fn get_block_height(&self, hash: &str) -> Option<u64> {
        self.heights.get(hash).copied()
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn to_record(&self) -> ChainRecord {
        ChainRecord {
            ver: self.version.clone(),
            blocks: self
                .blocks
                .iter()
                .map(|(hash, block)| (hash.clone(), BlockRecord::from(block.clone())))
                .collect(),
            hash: self.head_hash.clone(),
        }
    }

    /// Rebuild a store from its file shape, re-validating every block.
    pub fn from_record(record: ChainRecord, params: ConsensusParams) -> Result<Blockchain> {
        if record.ver != CHAIN_VERSION {
            return Err(BlockchainError::CorruptState(format!(
                "unsupported chain version {}",
                record.ver
            )));
        }

        let mut pending = Vec::with_capacity(record.blocks.len());
        for (key, block_record) in record.blocks {
            let block = Block::try_from(block_record)?;
            if block.get_hash() != key {
                return Err(BlockchainError::CorruptState(format!(
                    "block stored under {} hashes to {}",
                    short(&key),
                    short(block.get_hash())
                )));
            }
            pending.push(block);
        }

        let mut chain = Blockchain::new(params);
        while !pending.is_empty() {
            let (ready, rest): (Vec<Block>, Vec<Block>) =
                pending.into_iter().partition(|block| match block.get_previous_hash() {
                    None => true,
                    Some(previous) => chain.blocks.contains_key(previous),
                });
            if ready.is_empty() {
                return Err(BlockchainError::CorruptState(format!(
                    "{} blocks do not link to the chain",
                    rest.len()
                )));
            }
            for block in ready {
                let hash = block.get_hash().to_string();
                chain.append(block).map_err(|e| {
                    BlockchainError::CorruptState(format!("block {}: {e}", short(&hash)))
                })?;
            }
            pending = rest;
        }

        match record.hash {
            Some(head) => match chain.heights.get(&head) {
                Some(height) if Some(*height) == chain.height() => chain.head_hash = Some(head),
                _ => {
                    return Err(BlockchainError::CorruptState(format!(
                        "recorded head {} is not a longest branch tip",
                        short(&head)
                    )))
                }
            },
            None if !chain.is_empty() => {
                return Err(BlockchainError::CorruptState(
                    "chain has blocks but no head".to_string(),
                ))
            }
            None => {}
        }
        Ok(chain)
    }

    /// Blocks from genesis up to and including `tip`
    fn branch(&self, tip: Option<&str>) -> Vec<&Block> {
        let mut blocks = vec![];
        let mut cursor = tip;
        while let Some(block) = cursor.and_then(|hash| self.blocks.get(hash)) {
            blocks.push(block);
            cursor = block.get_previous_hash();
        }
        blocks.reverse();
        blocks
    }

    fn ledger(&self, tip: Option<&str>) -> Ledger {
        let mut ledger = Ledger::default();
        for block in self.branch(tip) {
            ledger.apply_block(block);
        }
        ledger
    }

    /// Hash of the main-chain block at `height`
    fn main_chain_at(&self, height: u64) -> Option<&str> {
        let mut cursor = self.head_hash.as_deref()?;
        loop {
            let current = *self.heights.get(cursor)?;
            if current == height {
                return Some(cursor);
            }
            if current < height {
                return None;
            }
            cursor = self.blocks.get(cursor)?.get_previous_hash()?;
        }
    }
}
