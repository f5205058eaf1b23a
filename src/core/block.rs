use crate::core::{Address, Digest, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{canonical_digest, canonical_encode};
use serde::{Deserialize, Serialize};

/// Proof-of-work solution: the nonce and who found it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub nonce: u64,
    pub solver_address: Address,
}

/// Block as it is stored and gossiped. The hash is not part of the record;
/// it is recomputed whenever a record is turned back into a [`Block`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub previous_hash: Option<Digest>,
    pub transactions: Vec<Transaction>,
    pub proof: Proof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord", into = "BlockRecord")]
pub struct Block {
    previous_hash: Option<Digest>,
    transactions: Vec<Transaction>,
    proof: Proof,
    hash: Digest,
}

impl Block {
    /// Unmined block on top of `previous_hash` with no transactions
    pub fn template(previous_hash: Option<Digest>, solver_address: Address) -> Result<Block> {
        let mut block = Block {
            previous_hash,
            transactions: vec![],
            proof: Proof {
                nonce: 0,
                solver_address,
            },
            hash: Digest::new(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// Digest of the canonical encoding of (previous hash, transactions, proof)
    pub fn compute_hash(&self) -> Result<Digest> {
        canonical_digest(&(&self.previous_hash, &self.transactions, &self.proof))
    }

    /// Encoded (previous hash, transactions): everything hashed before the
    /// proof. Fixed for the lifetime of a template.
    pub fn prefix_bytes(&self) -> Result<Vec<u8>> {
        canonical_encode(&(&self.previous_hash, &self.transactions))
    }

    pub fn push_transaction(&mut self, transaction: Transaction) -> Result<()> {
        self.transactions.push(transaction);
        self.hash = self.compute_hash()?;
        Ok(())
    }

    /// Install a solved nonce together with the hash it produces
    pub(crate) fn set_solution(&mut self, nonce: u64, hash: Digest) {
        self.proof.nonce = nonce;
        self.hash = hash;
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn get_previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_proof(&self) -> &Proof {
        &self.proof
    }

    pub fn get_solver(&self) -> &str {
        &self.proof.solver_address
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }
}

impl TryFrom<BlockRecord> for Block {
    type Error = BlockchainError;

    fn try_from(record: BlockRecord) -> Result<Block> {
        let mut block = Block {
            previous_hash: record.previous_hash,
            transactions: record.transactions,
            proof: record.proof,
            hash: Digest::new(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }
}

impl From<Block> for BlockRecord {
    fn from(block: Block) -> Self {
        BlockRecord {
            previous_hash: block.previous_hash,
            transactions: block.transactions,
            proof: block.proof,
        }
    }
}
