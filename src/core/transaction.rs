// Transactions: who sends what to whom.
// The hash covers (from, to, action) only, so the signature can be attached
// after hashing without changing the identity of the transaction.

use crate::error::{BlockchainError, Result};
use crate::utils::canonical_digest;
use crate::wallet::{short, validate_address, verify_signature, Identity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex encoded public key
pub type Address = String;
/// Hex encoded SHA-256 digest
pub type Digest = String;
/// Hex encoded fixed-width ECDSA signature
pub type Signature = String;

/// Payload of a transaction. Only `Payment` and `Reward` move value;
/// invoices and messages are recorded but never change balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Action {
    Invoice { amount: u64 },
    Payment { amount: u64 },
    Message { text: String },
    /// Coinbase for the block `block`, issued by nobody
    Reward { amount: u64, block: Digest },
}

impl Action {
    /// Value moved from sender to receiver
    pub fn transferred(&self) -> u64 {
        match self {
            Action::Payment { amount } | Action::Reward { amount, .. } => *amount,
            Action::Invoice { .. } | Action::Message { .. } => 0,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Invoice { amount } => write!(f, "invoice of {amount} picocoins"),
            Action::Payment { amount } => write!(f, "payment of {amount} picocoins"),
            Action::Message { text } => write!(f, "message {text:?}"),
            Action::Reward { amount, block } => {
                write!(f, "reward of {amount} picocoins for block {}", short(block))
            }
        }
    }
}

/// Why a single transaction is not acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionCheck {
    HashMismatch,
    MissingSender,
    MissingSignature,
    BadSignature,
    InvalidAddress,
    ZeroAmount,
    InsufficientFunds,
    AlreadyIncluded,
    UnexpectedSender,
    UnexpectedSignature,
    RewardUnknownBlock,
    RewardWrongSolver,
    RewardWrongAmount,
    RewardAlreadyClaimed,
}

impl fmt::Display for TransactionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TransactionCheck::HashMismatch => "hash does not match contents",
            TransactionCheck::MissingSender => "sender address missing",
            TransactionCheck::MissingSignature => "signature missing",
            TransactionCheck::BadSignature => "signature does not verify",
            TransactionCheck::InvalidAddress => "address is not a public key",
            TransactionCheck::ZeroAmount => "amount must be positive",
            TransactionCheck::InsufficientFunds => "sender balance too low",
            TransactionCheck::AlreadyIncluded => "transaction already on this branch",
            TransactionCheck::UnexpectedSender => "reward must not have a sender",
            TransactionCheck::UnexpectedSignature => "reward must not be signed",
            TransactionCheck::RewardUnknownBlock => "rewarded block is not an ancestor",
            TransactionCheck::RewardWrongSolver => "reward not paid to the block's solver",
            TransactionCheck::RewardWrongAmount => "reward amount does not match schedule",
            TransactionCheck::RewardAlreadyClaimed => "block already rewarded on this branch",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub(crate) from_address: Option<Address>,
    pub(crate) to_address: Address,
    pub(crate) action: Action,
    pub(crate) hash: Digest,
    pub(crate) signature: Option<Signature>,
}

impl Transaction {
    /// Build an unsigned transaction. Rewards must have no sender, every
    /// other action must have one.
    pub fn new(from_address: Option<Address>, to_address: Address, action: Action) -> Result<Self> {
        if !validate_address(&to_address) {
            return Err(BlockchainError::InvalidAddress(to_address));
        }
        match (&action, &from_address) {
            (Action::Reward { .. }, Some(_)) => {
                return Err(BlockchainError::Transaction(
                    "reward transactions have no sender".to_string(),
                ))
            }
            (Action::Reward { .. }, None) => {}
            (_, None) => {
                return Err(BlockchainError::Transaction(
                    "transaction needs a sender".to_string(),
                ))
            }
            (_, Some(from)) if !validate_address(from) => {
                return Err(BlockchainError::InvalidAddress(from.clone()))
            }
            _ => {}
        }

        let mut tx = Transaction {
            from_address,
            to_address,
            action,
            hash: Digest::new(),
            signature: None,
        };
        tx.hash = tx.compute_hash()?;
        Ok(tx)
    }

    /// Coinbase crediting `solver` for producing `block`
    pub fn reward(solver: Address, amount: u64, block: Digest) -> Result<Self> {
        Self::new(None, solver, Action::Reward { amount, block })
    }

    /// Digest of the canonical encoding of (from, to, action)
    pub fn compute_hash(&self) -> Result<Digest> {
        canonical_digest(&(&self.from_address, &self.to_address, &self.action))
    }

    pub fn sign(&mut self, identity: &Identity, passphrase: &str) -> Result<()> {
        if self.from_address.as_deref() != Some(identity.address()) {
            return Err(BlockchainError::Transaction(
                "only the sender can sign a transaction".to_string(),
            ));
        }
        self.signature = Some(identity.sign(&self.hash, passphrase)?);
        Ok(())
    }

    /// Context-free checks: hash integrity, sender/signature shape and the
    /// signature itself. Balance and reward rules need the chain and live in
    /// the chain store.
    pub fn check_well_formed(&self) -> std::result::Result<(), TransactionCheck> {
        match self.compute_hash() {
            Ok(hash) if hash == self.hash => {}
            _ => return Err(TransactionCheck::HashMismatch),
        }
        if !validate_address(&self.to_address) {
            return Err(TransactionCheck::InvalidAddress);
        }

        match (&self.action, &self.from_address, &self.signature) {
            (Action::Reward { amount, .. }, from, signature) => {
                if from.is_some() {
                    return Err(TransactionCheck::UnexpectedSender);
                }
                if signature.is_some() {
                    return Err(TransactionCheck::UnexpectedSignature);
                }
                if *amount == 0 {
                    return Err(TransactionCheck::ZeroAmount);
                }
            }
            (_, None, _) => return Err(TransactionCheck::MissingSender),
            (_, Some(_), None) => return Err(TransactionCheck::MissingSignature),
            (action, Some(from), Some(signature)) => {
                if !validate_address(from) {
                    return Err(TransactionCheck::InvalidAddress);
                }
                if let Action::Payment { amount: 0 } | Action::Invoice { amount: 0 } = action {
                    return Err(TransactionCheck::ZeroAmount);
                }
                if !verify_signature(&self.hash, signature, from) {
                    return Err(TransactionCheck::BadSignature);
                }
            }
        }
        Ok(())
    }

    pub fn from_address(&self) -> Option<&str> {
        self.from_address.as_deref()
    }

    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn is_reward(&self) -> bool {
        matches!(self.action, Action::Reward { .. })
    }
}
