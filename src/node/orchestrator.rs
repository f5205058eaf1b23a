// Ties the chain store, the miner and gossip together. Inbound messages are
// dispatched from server threads; the mining loop runs on its own thread.
// Each shared structure has its own lock and no lock is held across I/O.

use crate::config::Config;
use crate::core::{
    format_amount, Action, Block, BlockCheck, Blockchain, CancelToken, Miner, Transaction,
};
use crate::error::{BlockchainError, Result};
use crate::network::{BroadcastReport, Gossip, GossipMessage, GossipServer, MessageHandler, Peer};
use crate::storage::{save_chain, save_json, TransactionCache};
use crate::wallet::{short, Identity};
use log::{debug, error, info, warn};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::{Duration, Instant};

/// Where the node keeps its files
#[derive(Debug, Clone)]
pub struct NodePaths {
    pub chain: PathBuf,
    pub peers: PathBuf,
}

/// Mining loop timing
#[derive(Debug, Clone, Copy)]
pub struct MiningTiming {
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl MiningTiming {
    pub fn from_config(config: &Config) -> MiningTiming {
        MiningTiming {
            confirmation_timeout: config.get_confirmation_timeout(),
            poll_interval: config.get_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    Idle,
    AwaitingConfirmation,
    Mining,
}

impl fmt::Display for MiningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningState::Idle => write!(f, "idle"),
            MiningState::AwaitingConfirmation => write!(f, "awaiting confirmation"),
            MiningState::Mining => write!(f, "mining"),
        }
    }
}

pub struct Node {
    identity: Identity,
    chain: RwLock<Blockchain>,
    gossip: Gossip,
    cache: TransactionCache,
    paths: NodePaths,
    mining: bool,
    timing: MiningTiming,
    state: RwLock<MiningState>,
    cancel: CancelToken,
}

impl Node {
    pub fn new(
        identity: Identity,
        chain: Blockchain,
        gossip: Gossip,
        paths: NodePaths,
        mining: bool,
        timing: MiningTiming,
    ) -> Node {
        Node {
            identity,
            chain: RwLock::new(chain),
            gossip,
            cache: TransactionCache::new(),
            paths,
            mining,
            timing,
            state: RwLock::new(MiningState::Idle),
            cancel: CancelToken::new(),
        }
    }

    fn read_chain(&self) -> Result<RwLockReadGuard<'_, Blockchain>> {
        self.chain
            .read()
            .map_err(|e| BlockchainError::CorruptState(format!("Chain lock poisoned: {e}")))
    }

    fn write_chain(&self) -> Result<RwLockWriteGuard<'_, Blockchain>> {
        self.chain
            .write()
            .map_err(|e| BlockchainError::CorruptState(format!("Chain lock poisoned: {e}")))
    }

    fn set_state(&self, state: MiningState) {
        match self.state.write() {
            Ok(mut current) => {
                if *current != state {
                    debug!("Mining state: {current} -> {state}");
                }
                *current = state;
            }
            Err(_) => error!("Failed to acquire write lock on mining state"),
        }
    }

    pub fn get_state(&self) -> MiningState {
        match self.state.read() {
            Ok(state) => *state,
            Err(_) => MiningState::Idle,
        }
    }

    pub fn get_identity(&self) -> &Identity {
        &self.identity
    }

    pub fn get_gossip(&self) -> &Gossip {
        &self.gossip
    }

    pub fn get_cache(&self) -> &TransactionCache {
        &self.cache
    }

    pub fn is_mining(&self) -> bool {
        self.mining
    }

    /// Run `f` against the chain under a read lock
    pub fn with_chain<R>(&self, f: impl FnOnce(&Blockchain) -> R) -> Result<R> {
        Ok(f(&*self.read_chain()?))
    }

    pub fn balance(&self) -> Result<u64> {
        self.with_chain(|chain| chain.balance_of(self.identity.address()))
    }

    fn persist_chain(&self) {
        let result = self
            .read_chain()
            .and_then(|chain| save_chain(&self.paths.chain, &chain));
        if let Err(e) = result {
            error!("Failed to save chain to {}: {e}", self.paths.chain.display());
        }
    }

    fn persist_peers(&self) {
        let result = self
            .gossip
            .get_peer_set()
            .and_then(|peers| save_json(&self.paths.peers, &peers));
        if let Err(e) = result {
            error!("Failed to save peers to {}: {e}", self.paths.peers.display());
        }
    }

    /// Register this node in its own peer set and tell everyone about it
    pub fn announce(&self, own: Peer) -> Result<BroadcastReport> {
        self.gossip.update_own_peer(own)?;
        self.persist_peers();
        let peers = self.gossip.get_peers()?;
        self.gossip.broadcast(&GossipMessage::Peers(peers))
    }

    /// Build and sign a transaction from this node's identity
    pub fn create_transaction(
        &self,
        to: &str,
        action: Action,
        passphrase: &str,
    ) -> Result<Transaction> {
        let mut tx = Transaction::new(
            Some(self.identity.address().to_string()),
            to.to_string(),
            action,
        )?;
        tx.sign(&self.identity, passphrase)?;
        Ok(tx)
    }

    /// Relay a local transaction; a mining node also queues it for its next
    /// block
    pub fn submit_transaction(&self, tx: Transaction) -> Result<BroadcastReport> {
        let report = self.gossip.broadcast(&GossipMessage::Trans(tx.clone()))?;
        if self.mining {
            self.cache_transaction(tx);
        }
        Ok(report)
    }

    fn cache_transaction(&self, tx: Transaction) {
        let hash = tx.hash().to_string();
        if self.cache.add(tx) {
            info!("Transaction {} will be in next block", short(&hash));
        }
    }

    pub fn dispatch(&self, message: GossipMessage, from: SocketAddr) {
        let result = match message {
            GossipMessage::Peers(peers) => self.handle_peers(peers),
            GossipMessage::Block(block) => self.handle_block(block).map(|_| ()),
            GossipMessage::Trans(tx) => {
                self.handle_transaction(tx);
                Ok(())
            }
        };
        if let Err(e) = result {
            error!("Error processing message from {from}: {e}");
        }
    }

    fn handle_peers(&self, peers: Vec<Peer>) -> Result<()> {
        if !self.gossip.merge_peers(peers.clone())? {
            return Ok(());
        }
        self.persist_peers();
        self.gossip.broadcast(&GossipMessage::Peers(peers))?;
        Ok(())
    }

    /// Validate and append under one write lock, then persist and relay
    /// without it. Returns whether the block was new and valid.
    pub fn handle_block(&self, block: Block) -> Result<bool> {
        let hash = block.get_hash().to_string();
        let (changed, head_moved) = {
            let mut chain = self.write_chain()?;
            match chain.validate(&block) {
                BlockCheck::Ok => {}
                BlockCheck::Duplicate => {
                    debug!("Block {} already known", short(&hash));
                    return Ok(false);
                }
                check => {
                    warn!("Rejected block {}: {check}", short(&hash));
                    return Ok(false);
                }
            }
            let head_before = chain.head_hash().map(str::to_string);
            let changed = chain.append(block.clone())?;
            (changed, chain.head_hash() != head_before.as_deref())
        };

        info!("Accepted block {}", short(&hash));
        if head_moved && self.mining {
            // the running search builds on a stale head
            self.cancel.cancel();
        }
        if changed {
            self.persist_chain();
        }
        self.gossip.broadcast(&GossipMessage::Block(block))?;
        Ok(changed)
    }

    fn handle_transaction(&self, tx: Transaction) {
        if !self.mining {
            debug!("Ignoring transaction {}: not mining", short(tx.hash()));
            return;
        }
        if let Err(reason) = tx.check_well_formed() {
            warn!("Dropping transaction {}: {reason}", short(tx.hash()));
            return;
        }
        self.cache_transaction(tx);
    }

    /// Mine forever. Only returns on an unrecoverable error.
    pub fn run_mining(&self) -> Result<()> {
        let mut prior: Option<String> = None;
        loop {
            if let Some(block) = self.mine_once(prior.as_deref())? {
                prior = Some(block.get_hash().to_string());
            }
        }
    }

    /// One pass of the mining loop: wait for `prior` to be confirmed, fill a
    /// template, search, then append and announce the result. Returns the
    /// solved block, or `None` if the search was abandoned.
    pub fn mine_once(&self, prior: Option<&str>) -> Result<Option<Block>> {
        self.set_state(MiningState::AwaitingConfirmation);
        self.await_confirmation(prior)?;

        self.set_state(MiningState::Mining);
        // reset before the template snapshot so a head change after it still
        // cancels this search
        self.cancel.reset();
        let template = self.next_template()?;

        let pow = self.read_chain()?.proof_of_work().clone();
        let mut miner = Miner::new(pow, self.cancel.clone());
        miner.set_template(template.clone());
        let solved = match miner.work()? {
            Some(block) => block,
            None => {
                let parent = template.get_previous_hash().unwrap_or("genesis");
                info!("Template on {} abandoned", short(parent));
                self.cache.restore(template.into_transactions());
                self.set_state(MiningState::AwaitingConfirmation);
                return Ok(None);
            }
        };

        let hash = solved.get_hash().to_string();
        let (accepted, reward) = {
            let mut chain = self.write_chain()?;
            match chain.validate(&solved) {
                BlockCheck::Ok => {
                    let amount = chain.reward_for(&solved).unwrap_or(0);
                    chain.append(solved.clone())?;
                    // schedules that have run dry pay nothing
                    let reward = match amount {
                        0 => None,
                        amount => Some(Transaction::reward(
                            self.identity.address().to_string(),
                            amount,
                            hash.clone(),
                        )?),
                    };
                    (true, reward)
                }
                check => {
                    warn!("Solved block {} rejected: {check}", short(&hash));
                    (false, None)
                }
            }
        };

        if accepted {
            let amount = reward.as_ref().map_or(0, |tx| tx.action().transferred());
            info!("Block {} solved: reward {}", short(&hash), format_amount(amount));
            self.persist_chain();
            if let Some(reward) = reward {
                self.cache_transaction(reward.clone());
                self.gossip.broadcast(&GossipMessage::Trans(reward))?;
            }
            self.gossip.broadcast(&GossipMessage::Block(solved.clone()))?;
        }

        // next pass starts by waiting on the block just solved
        self.set_state(MiningState::AwaitingConfirmation);
        Ok(Some(solved))
    }

    /// Hold off while the last solved block is the unconfirmed head. Stop
    /// waiting once something is built on it, it loses the head, or the
    /// timeout passes.
    fn await_confirmation(&self, prior: Option<&str>) -> Result<()> {
        let Some(prior) = prior else {
            return Ok(());
        };
        let started = Instant::now();
        loop {
            let (depth, is_head) = {
                let chain = self.read_chain()?;
                (chain.confirmation_depth(prior), chain.is_head(prior))
            };
            if depth > 0 {
                debug!("Block {} confirmed", short(prior));
                return Ok(());
            }
            if !is_head {
                info!("Block {} was orphaned", short(prior));
                return Ok(());
            }
            if started.elapsed() >= self.timing.confirmation_timeout {
                debug!("No confirmation for {} yet, mining on top of it", short(prior));
                return Ok(());
            }
            thread::sleep(self.timing.poll_interval);
        }
    }

    /// Template on the current head holding every cached transaction that
    /// still fits; the rest are dropped.
    fn next_template(&self) -> Result<Block> {
        let chain = self.read_chain()?;
        let mut template = chain.new_block_template(self.identity.address())?;

        let candidates = self.cache.take_all();
        let (admissible, rejected) =
            chain.filter_admissible(template.get_previous_hash(), candidates);
        for (tx, reason) in rejected {
            warn!("Dropping cached transaction {}: {reason}", short(tx.hash()));
        }
        for tx in admissible {
            chain.add_transaction(&mut template, tx)?;
        }
        Ok(template)
    }

    /// Serve inbound gossip on the calling thread, mining on another one
    /// when enabled
    pub fn run(self: Arc<Self>, server: GossipServer) -> Result<()> {
        if self.mining {
            let miner = Arc::clone(&self);
            thread::spawn(move || {
                if let Err(e) = miner.run_mining() {
                    error!("Mining stopped: {e}");
                }
            });
        }
        server.serve(self)
    }
}

impl MessageHandler for Node {
    fn handle(&self, message: GossipMessage, from: SocketAddr) {
        self.dispatch(message, from);
    }
}
