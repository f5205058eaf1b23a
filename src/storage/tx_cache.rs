use crate::core::Transaction;
use std::sync::RwLock;

/// Pending transactions waiting for the next block template, in arrival
/// order, at most one per hash
pub struct TransactionCache {
    inner: RwLock<Vec<Transaction>>,
}

impl Default for TransactionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionCache {
    pub fn new() -> TransactionCache {
        TransactionCache {
            inner: RwLock::new(vec![]),
        }
    }

    /// Returns `false` if a transaction with the same hash is already cached
    pub fn add(&self, tx: Transaction) -> bool {
        match self.inner.write() {
            Ok(mut cache) => {
                if cache.iter().any(|cached| cached.hash() == tx.hash()) {
                    return false;
                }
                cache.push(tx);
                true
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on transaction cache");
                false
            }
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        match self.inner.read() {
            Ok(cache) => cache.iter().any(|tx| tx.hash() == hash),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction cache");
                false
            }
        }
    }

    /// Empty the cache, handing back its contents in order
    pub fn take_all(&self) -> Vec<Transaction> {
        match self.inner.write() {
            Ok(mut cache) => std::mem::take(&mut *cache),
            Err(_) => {
                log::error!("Failed to acquire write lock on transaction cache");
                Vec::new()
            }
        }
    }

    /// Put transactions from an abandoned template back in front of anything
    /// that arrived since
    pub fn restore(&self, transactions: Vec<Transaction>) {
        match self.inner.write() {
            Ok(mut cache) => {
                let newer = std::mem::take(&mut *cache);
                for tx in transactions.into_iter().chain(newer) {
                    if !cache.iter().any(|cached| cached.hash() == tx.hash()) {
                        cache.push(tx);
                    }
                }
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on transaction cache");
            }
        }
    }

    pub fn get_all(&self) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(cache) => cache.clone(),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction cache");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(cache) => cache.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on transaction cache");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
