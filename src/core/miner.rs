use crate::core::{Block, ProofOfWork};
use crate::error::{BlockchainError, Result};
use crate::utils::{canonical_encode, hex_encode};
use log::{debug, info};
use ring::digest::{Context, SHA256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Attempts between cancellation checks
pub const DEFAULT_BATCH_SIZE: u64 = 4096;

/// Shared flag that asks a running search to stop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Proof-of-work search over one block template at a time
pub struct Miner {
    pow: ProofOfWork,
    template: Option<Block>,
    cancel: CancelToken,
    batch_size: u64,
}

impl Miner {
    pub fn new(pow: ProofOfWork, cancel: CancelToken) -> Miner {
        Miner {
            pow,
            template: None,
            cancel,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u64) -> Miner {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Install the block to mine, replacing any previous template
    pub fn set_template(&mut self, block: Block) {
        self.template = Some(block);
    }

    /// Search nonces from zero until the hash meets the target. Every batch
    /// the cancel token is checked and the thread yields. Returns `None` when
    /// the search was cancelled; the template is consumed either way.
    pub fn work(&mut self) -> Result<Option<Block>> {
        let mut block = self
            .template
            .take()
            .ok_or_else(|| BlockchainError::Mining("no block template installed".to_string()))?;

        // hash = sha256(prefix || nonce || solver), prefix fixed per template
        let mut base = Context::new(&SHA256);
        base.update(&block.prefix_bytes()?);
        let solver = canonical_encode(&block.get_proof().solver_address)?;

        info!(
            "Mining block on top of {} with {} transactions (difficulty: {})",
            block.get_previous_hash().unwrap_or("genesis"),
            block.get_transactions().len(),
            self.pow.difficulty()
        );

        for nonce in 0..=u64::MAX {
            if nonce % self.batch_size == 0 {
                if self.cancel.is_cancelled() {
                    debug!("Search cancelled after {nonce} attempts");
                    return Ok(None);
                }
                thread::yield_now();
            }

            let mut context = base.clone();
            context.update(&canonical_encode(&nonce)?);
            context.update(&solver);
            let digest = context.finish();

            if self.pow.meets_target_bytes(digest.as_ref()) {
                block.set_solution(nonce, hex_encode(digest.as_ref()));
                return Ok(Some(block));
            }
        }

        Err(BlockchainError::Mining("nonce space exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::test_identity;

    #[test]
    fn test_work_finds_valid_nonce() {
        let solver = test_identity();
        let pow = ProofOfWork::new(8);
        let mut miner = Miner::new(pow.clone(), CancelToken::new());

        miner.set_template(Block::template(None, solver.address().to_string()).unwrap());
        let block = miner.work().unwrap().expect("search should not be cancelled");

        assert!(pow.validate(&block));
        assert_eq!(block.get_hash(), block.compute_hash().unwrap());
    }

    #[test]
    fn test_work_without_template_fails() {
        let mut miner = Miner::new(ProofOfWork::new(1), CancelToken::new());
        assert!(miner.work().is_err());
    }

    #[test]
    fn test_cancelled_search_returns_none() {
        let solver = test_identity();
        let cancel = CancelToken::new();
        // a target no search will hit in the first batch
        let mut miner = Miner::new(ProofOfWork::new(200), cancel.clone()).with_batch_size(16);

        miner.set_template(Block::template(None, solver.address().to_string()).unwrap());
        cancel.cancel();
        assert!(miner.work().unwrap().is_none());
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let solver = test_identity();
        let cancel = CancelToken::new();
        let mut miner = Miner::new(ProofOfWork::new(200), cancel.clone()).with_batch_size(64);
        miner.set_template(Block::template(None, solver.address().to_string()).unwrap());

        let handle = thread::spawn(move || miner.work());
        thread::sleep(std::time::Duration::from_millis(50));
        cancel.cancel();

        assert!(handle.join().unwrap().unwrap().is_none());
    }

    #[test]
    fn test_token_reset() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!token.is_cancelled());
    }
}
