use crate::core::{ConsensusParams, RewardSchedule, DEFAULT_BLOCK_REWARD, DEFAULT_DIFFICULTY_BITS};
use crate::error::{BlockchainError, Result};
use crate::network::{Peer, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT};
use crate::storage::KdfParams;
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_PORT_KEY: &str = "NODE_PORT";

static DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

/// Seed peers of the public network
pub const BOOTSTRAP_PEERS: [&str; 2] = ["2002:c257:6f39::1:10000", "2002:c257:65d4::1:10000"];

/// Node settings. Every field has a default, so an empty or missing file is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_address: String,
    pub port: u16,
    pub difficulty_bits: u32,
    pub block_reward: u64,
    pub halving_interval: Option<u64>,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub peer_timeout_ms: u64,
    pub max_connections: usize,
    pub kdf_memory_kib: u32,
    pub kdf_iterations: u32,
    pub bootstrap_peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Config {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            block_reward: DEFAULT_BLOCK_REWARD,
            halving_interval: None,
            confirmation_timeout_secs: 60,
            poll_interval_ms: 50,
            peer_timeout_ms: 5000,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            kdf_memory_kib: kdf.memory_kib,
            kdf_iterations: kdf.iterations,
            bootstrap_peers: BOOTSTRAP_PEERS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with `path` when given, then with the environment
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    BlockchainError::Config(format!("Cannot read {}: {e}", path.display()))
                })?;
                let config: Config = toml::from_str(&contents)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = env::var(NODE_ADDRESS_KEY) {
            self.listen_address = addr;
        }
        if let Ok(port) = env::var(NODE_PORT_KEY) {
            self.port = port
                .parse()
                .map_err(|e| BlockchainError::Config(format!("Invalid {NODE_PORT_KEY}: {e}")))?;
        }
        Ok(())
    }

    pub fn set_listen_address(&mut self, addr: String) {
        self.listen_address = addr;
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn get_listen_addr(&self) -> Result<SocketAddr> {
        let ip = self.listen_address.parse::<IpAddr>().map_err(|e| {
            BlockchainError::Config(format!(
                "Invalid listen address {}: {e}",
                self.listen_address
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// This node as other nodes should reach it
    pub fn get_own_peer(&self) -> Result<Peer> {
        Ok(Peer::from(self.get_listen_addr()?))
    }

    pub fn get_bootstrap_peers(&self) -> Result<Vec<Peer>> {
        self.bootstrap_peers.iter().map(|p| p.parse()).collect()
    }

    pub fn get_consensus_params(&self) -> ConsensusParams {
        let reward = match self.halving_interval {
            Some(interval) => RewardSchedule::Halving {
                initial: self.block_reward,
                interval,
            },
            None => RewardSchedule::Fixed(self.block_reward),
        };
        ConsensusParams {
            difficulty_bits: self.difficulty_bits,
            reward,
        }
    }

    pub fn get_kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
        }
    }

    pub fn get_confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn get_poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn get_peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }
}
