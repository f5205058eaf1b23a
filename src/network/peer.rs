use crate::core::Digest;
use crate::error::{BlockchainError, Result};
use crate::utils::canonical_digest;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Port a node listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 10000;

/// A reachable node. The host field keeps its historical name even though
/// IPv4 addresses are accepted too.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, bincode::Encode,
)]
pub struct Peer {
    pub ipv6: String,
    pub port: u16,
}

impl Peer {
    pub fn new(ipv6: impl Into<String>, port: u16) -> Peer {
        Peer {
            ipv6: ipv6.into(),
            port,
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .ipv6
            .parse::<IpAddr>()
            .map_err(|e| BlockchainError::Network(format!("Invalid peer host {}: {e}", self.ipv6)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl From<SocketAddr> for Peer {
    fn from(addr: SocketAddr) -> Self {
        Peer::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.socket_addr() {
            Ok(addr) => write!(f, "{addr}"),
            Err(_) => write!(f, "{}:{}", self.ipv6, self.port),
        }
    }
}

/// Accepts `host:port`, `[v6]:port` and the bare `v6:port` form where the
/// last colon separates the port.
impl FromStr for Peer {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(addr.into());
        }
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| BlockchainError::Config(format!("Peer {s} has no port")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| BlockchainError::Config(format!("Invalid port in {s}: {e}")))?;
        let ip = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|e| BlockchainError::Config(format!("Invalid host in {s}: {e}")))?;
        Ok(Peer::new(ip.to_string(), port))
    }
}

/// Peer file shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSetRecord {
    pub hash: Option<Digest>,
    pub peers: Vec<Peer>,
}

/// Known peers, kept sorted and free of duplicates. `hash` commits to the
/// member list; the node's own entry is never dropped by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PeerSetRecord", into = "PeerSetRecord")]
pub struct PeerSet {
    hash: Option<Digest>,
    peers: Vec<Peer>,
    own: Option<Peer>,
}

impl PeerSet {
    pub fn new() -> PeerSet {
        PeerSet::default()
    }

    pub fn with_peers(peers: impl IntoIterator<Item = Peer>) -> PeerSet {
        let mut set = PeerSet::new();
        set.merge_peers(peers);
        set
    }

    /// Returns `true` if the peer was not known yet
    pub fn add_peer(&mut self, peer: Peer) -> bool {
        match self.peers.binary_search(&peer) {
            Ok(_) => false,
            Err(index) => {
                self.peers.insert(index, peer);
                self.rehash();
                true
            }
        }
    }

    /// Record which entry is this node, adding it if missing
    pub fn update_own_peer(&mut self, peer: Peer) -> bool {
        self.own = Some(peer.clone());
        self.add_peer(peer)
    }

    /// Replace the members with `candidates` if they differ, keeping this
    /// node's own entry. Returns whether the membership changed.
    pub fn merge_peers(&mut self, candidates: impl IntoIterator<Item = Peer>) -> bool {
        let mut peers: Vec<Peer> = candidates.into_iter().collect();
        if let Some(own) = &self.own {
            peers.push(own.clone());
        }
        peers.sort();
        peers.dedup();

        if peers == self.peers {
            return false;
        }
        self.peers = peers;
        self.rehash();
        true
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        self.peers.binary_search(peer).is_ok()
    }

    pub fn get_peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Everyone but this node
    pub fn get_remote_peers(&self) -> Vec<Peer> {
        self.peers
            .iter()
            .filter(|peer| Some(*peer) != self.own.as_ref())
            .cloned()
            .collect()
    }

    pub fn get_own_peer(&self) -> Option<&Peer> {
        self.own.as_ref()
    }

    pub fn get_hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    fn compute_hash(peers: &[Peer]) -> Option<Digest> {
        match canonical_digest(&peers) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Failed to hash peer list: {e}");
                None
            }
        }
    }

    fn rehash(&mut self) {
        self.hash = Self::compute_hash(&self.peers);
    }
}

impl From<PeerSetRecord> for PeerSet {
    fn from(record: PeerSetRecord) -> Self {
        let mut peers = record.peers;
        peers.sort();
        peers.dedup();

        let hash = Self::compute_hash(&peers);
        if record.hash.is_some() && record.hash != hash {
            warn!("Peer list hash does not match its members, recomputing");
        }
        PeerSet {
            hash,
            peers,
            own: None,
        }
    }
}

impl From<PeerSet> for PeerSetRecord {
    fn from(set: PeerSet) -> Self {
        PeerSetRecord {
            hash: set.hash,
            peers: set.peers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(port: u16) -> Peer {
        Peer::new("127.0.0.1", port)
    }

    #[test]
    fn test_parse_peer_forms() {
        let plain: Peer = "127.0.0.1:10000".parse().unwrap();
        assert_eq!(plain, local(10000));

        let bracketed: Peer = "[2002:c257:6f39::1]:10000".parse().unwrap();
        let bare: Peer = "2002:c257:6f39::1:10000".parse().unwrap();
        assert_eq!(bracketed, bare);
        assert_eq!(bare.ipv6, "2002:c257:6f39::1");
        assert_eq!(bare.port, 10000);

        assert!("nonsense".parse::<Peer>().is_err());
        assert!("127.0.0.1:notaport".parse::<Peer>().is_err());
    }

    #[test]
    fn test_socket_addr() {
        let peer = Peer::new("::1", 10001);
        assert_eq!(peer.socket_addr().unwrap(), "[::1]:10001".parse().unwrap());
        assert!(Peer::new("not-an-ip", 1).socket_addr().is_err());
    }

    #[test]
    fn test_merge_replaces_membership_when_different() {
        let mut set = PeerSet::with_peers(vec![local(1), local(2)]);
        let hash = set.get_hash().map(str::to_string);

        // same members in another order
        assert!(!set.merge_peers(vec![local(2), local(1), local(2)]));
        assert_eq!(set.get_hash().map(str::to_string), hash);

        // a subset drops the missing member
        assert!(set.merge_peers(vec![local(1)]));
        assert_eq!(set.get_peers(), &[local(1)]);
        assert_ne!(set.get_hash().map(str::to_string), hash);

        assert!(set.merge_peers(vec![local(3), local(1)]));
        assert_eq!(set.get_peers(), &[local(1), local(3)]);
        assert_eq!(
            set.get_hash(),
            PeerSet::with_peers(vec![local(1), local(3)]).get_hash()
        );
    }

    #[test]
    fn test_own_peer_is_kept_and_excluded_from_remotes() {
        let mut set = PeerSet::with_peers(vec![local(1)]);
        assert!(set.update_own_peer(local(2)));
        assert!(!set.update_own_peer(local(2)));

        assert!(set.merge_peers(vec![local(3)]));
        assert!(set.contains(&local(2)));
        assert!(!set.contains(&local(1)));
        assert_eq!(set.get_remote_peers(), vec![local(3)]);

        // a list that only lacks our own entry changes nothing
        assert!(!set.merge_peers(vec![local(3)]));
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let a = PeerSet::with_peers(vec![local(1), local(2)]);
        let b = PeerSet::with_peers(vec![local(2), local(1)]);
        assert_eq!(a.get_hash(), b.get_hash());
        assert!(a.get_hash().is_some());
    }

    #[test]
    fn test_record_round_trip() {
        let mut set = PeerSet::with_peers(vec![local(5), Peer::new("::1", 6)]);
        set.update_own_peer(local(7));

        let value = serde_json::to_value(&set).unwrap();
        assert!(value.get("hash").is_some());
        assert_eq!(value["peers"].as_array().unwrap().len(), 3);

        let back: PeerSet = serde_json::from_value(value).unwrap();
        assert_eq!(back.get_peers(), set.get_peers());
        assert_eq!(back.get_hash(), set.get_hash());
        // which entry is ours is not persisted
        assert!(back.get_own_peer().is_none());
    }

    #[test]
    fn test_unsorted_record_is_normalised() {
        let json = r#"{"hash": "bogus", "peers": [
            {"ipv6": "127.0.0.1", "port": 2},
            {"ipv6": "127.0.0.1", "port": 1},
            {"ipv6": "127.0.0.1", "port": 2}
        ]}"#;
        let set: PeerSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.get_peers(), &[local(1), local(2)]);
        assert_eq!(set.get_hash(), PeerSet::with_peers(vec![local(1), local(2)]).get_hash());
    }
}
