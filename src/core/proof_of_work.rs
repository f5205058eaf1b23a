use crate::core::Block;
use crate::utils::hex_decode;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Hardest supported difficulty; the target is never below 2
pub const MAX_DIFFICULTY_BITS: u32 = 255;

/// The network's difficulty predicate: a block hash read as a big-endian
/// 256-bit number must be below `2^(256 - difficulty)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    target: BigInt,
    difficulty: u32,
}

impl ProofOfWork {
    pub fn new(difficulty_bits: u32) -> ProofOfWork {
        let difficulty = difficulty_bits.min(MAX_DIFFICULTY_BITS);
        let mut target = BigInt::from(1);
        target.shl_assign(256 - difficulty);
        ProofOfWork { target, difficulty }
    }

    pub fn meets_target_bytes(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    pub fn meets_target(&self, hash_hex: &str) -> bool {
        match hex_decode(hash_hex) {
            Ok(bytes) => self.meets_target_bytes(&bytes),
            Err(_) => false,
        }
    }

    /// Hash recomputes from the block's contents and satisfies the target
    pub fn validate(&self, block: &Block) -> bool {
        match block.compute_hash() {
            Ok(hash) => hash == block.get_hash() && self.meets_target(&hash),
            Err(_) => false,
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target(&self) -> &BigInt {
        &self.target
    }
}
