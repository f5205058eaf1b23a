use crate::error::{BlockchainError, Result};
use log::debug;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::RwLock;

/// Default limit on simultaneous inbound connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 32;

/// Bookkeeping for inbound gossip connections
///
/// Each open connection holds a handler thread, so the number of them is
/// capped. Nothing here decides who to talk to; that is the peer set's job.
pub struct ConnectionTracker {
    /// Remote ends of currently open connections
    connected: RwLock<HashSet<SocketAddr>>,
    max_connections: usize,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}

impl ConnectionTracker {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connected: RwLock::new(HashSet::new()),
            max_connections,
        }
    }

    /// Record an accepted connection
    pub fn record_connection(&self, address: SocketAddr) -> Result<()> {
        let mut connected = self.connected.write().map_err(|e| {
            BlockchainError::Network(format!("Failed to acquire connection lock: {e}"))
        })?;

        connected.insert(address);
        debug!("Connection opened from {address}");
        Ok(())
    }

    /// Record a closed connection
    pub fn record_disconnection(&self, address: SocketAddr) -> Result<()> {
        let mut connected = self.connected.write().map_err(|e| {
            BlockchainError::Network(format!("Failed to acquire connection lock: {e}"))
        })?;

        connected.remove(&address);
        debug!("Connection closed from {address}");
        Ok(())
    }

    pub fn get_connected_addresses(&self) -> Result<HashSet<SocketAddr>> {
        let connected = self.connected.read().map_err(|e| {
            BlockchainError::Network(format!("Failed to acquire connection lock: {e}"))
        })?;
        Ok(connected.clone())
    }

    pub fn get_connected_count(&self) -> Result<usize> {
        let connected = self.connected.read().map_err(|e| {
            BlockchainError::Network(format!("Failed to acquire connection lock: {e}"))
        })?;
        Ok(connected.len())
    }

    /// Check if we should accept more connections
    pub fn should_accept_connection(&self) -> Result<bool> {
        Ok(self.get_connected_count()? < self.max_connections)
    }
}
