use crate::error::{BlockchainError, Result};
use crate::network::{GossipMessage, Peer, PeerSet};
use log::{debug, info, warn};
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;
use std::time::Duration;

/// Default per-peer connect and write timeout
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of sending one message to every remote peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: Vec<Peer>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Outbound side of the network: the peer set and fan-out to it
pub struct Gossip {
    peers: RwLock<PeerSet>,
    timeout: Duration,
}

impl Gossip {
    pub fn new(peers: PeerSet, timeout: Duration) -> Gossip {
        Gossip {
            peers: RwLock::new(peers),
            timeout,
        }
    }

    fn read_peers(&self) -> Result<RwLockReadGuard<'_, PeerSet>> {
        self.peers
            .read()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))
    }

    fn write_peers(&self) -> Result<RwLockWriteGuard<'_, PeerSet>> {
        self.peers
            .write()
            .map_err(|e| BlockchainError::Network(format!("Failed to acquire peer lock: {e}")))
    }

    /// Copy of the current peer set, for persisting
    pub fn get_peer_set(&self) -> Result<PeerSet> {
        Ok(self.read_peers()?.clone())
    }

    pub fn get_peers(&self) -> Result<Vec<Peer>> {
        Ok(self.read_peers()?.get_peers().to_vec())
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn add_peer(&self, peer: Peer) -> Result<bool> {
        Ok(self.write_peers()?.add_peer(peer))
    }

    pub fn update_own_peer(&self, peer: Peer) -> Result<bool> {
        Ok(self.write_peers()?.update_own_peer(peer))
    }

    pub fn merge_peers(&self, candidates: Vec<Peer>) -> Result<bool> {
        let changed = self.write_peers()?.merge_peers(candidates);
        if changed {
            info!("Peers updated");
        }
        Ok(changed)
    }

    /// Send `message` to every peer except this node, one thread per peer,
    /// and wait for all of them. A slow peer costs at most the timeout.
    pub fn broadcast(&self, message: &GossipMessage) -> Result<BroadcastReport> {
        let payload = message.to_bytes()?;
        let targets = self.read_peers()?.get_remote_peers();
        let timeout = self.timeout;

        let outcomes: Vec<(Peer, Result<()>)> = thread::scope(|scope| {
            let handles: Vec<_> = targets
                .into_iter()
                .map(|peer| {
                    let payload = payload.as_slice();
                    scope.spawn(move || {
                        let outcome = peer
                            .socket_addr()
                            .and_then(|addr| send_data(addr, payload, timeout));
                        (peer, outcome)
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|handle| handle.join().ok())
                .collect()
        });

        let mut report = BroadcastReport::default();
        for (peer, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!("Failed to send {} to {peer}: {e}", message.kind());
                    report.failed.push(peer);
                }
            }
        }
        debug!(
            "Broadcast {message}: {} delivered, {} failed",
            report.delivered,
            report.failed.len()
        );
        Ok(report)
    }
}

/// Open a connection, write one JSON document and close it
pub fn send_data(addr: SocketAddr, payload: &[u8], timeout: Duration) -> Result<()> {
    let mut stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;

    stream
        .set_write_timeout(Some(timeout))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

    stream
        .write_all(payload)
        .and_then(|_| stream.flush())
        .map_err(|e| BlockchainError::Network(format!("Failed to send data to {addr}: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::io::Read;
    use std::net::TcpListener;

    fn listener() -> (TcpListener, Peer) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let peer = Peer::from(listener.local_addr().unwrap());
        (listener, peer)
    }

    #[test]
    fn test_broadcast_skips_own_peer_and_reports_failures() {
        let (remote, remote_peer) = listener();
        let (_own, own_peer) = listener();
        // bound then dropped, so nothing listens there
        let (closed, closed_peer) = listener();
        drop(closed);

        let mut set = PeerSet::with_peers(vec![remote_peer.clone(), closed_peer.clone()]);
        set.update_own_peer(own_peer);
        let gossip = Gossip::new(set, Duration::from_millis(500));

        let message = GossipMessage::Peers(vec![remote_peer]);
        let report = gossip.broadcast(&message).unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![closed_peer]);
        assert_eq!(report.attempted(), 2);

        let (mut stream, _) = remote.accept().unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(GossipMessage::from_value(value).unwrap(), message);
    }

    #[test]
    fn test_broadcast_with_no_remote_peers() {
        let mut set = PeerSet::new();
        set.update_own_peer(Peer::new("127.0.0.1", 1));
        let gossip = Gossip::new(set, DEFAULT_PEER_TIMEOUT);

        let report = gossip.broadcast(&GossipMessage::Peers(vec![])).unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn test_merge_through_gossip() {
        let gossip = Gossip::new(PeerSet::new(), DEFAULT_PEER_TIMEOUT);
        let one = Peer::new("::1", 1);
        let two = Peer::new("::1", 2);
        assert!(gossip.merge_peers(vec![one.clone(), two]).unwrap());
        assert!(!gossip
            .merge_peers(gossip.get_peers().unwrap())
            .unwrap());

        assert!(gossip.merge_peers(vec![one.clone()]).unwrap());
        assert_eq!(gossip.get_peers().unwrap(), vec![one]);
    }
}
