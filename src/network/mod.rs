//! Peer-to-peer gossip
//!
//! Every message is a JSON document pushed to each known peer over a fresh
//! TCP connection. There is no request/response: nodes converge because
//! every accepted block, transaction and peer-list change is relayed.

pub mod connections;
pub mod gossip;
pub mod message;
pub mod peer;
pub mod server;

pub use connections::{ConnectionTracker, DEFAULT_MAX_CONNECTIONS};
pub use gossip::{send_data, BroadcastReport, Gossip, DEFAULT_PEER_TIMEOUT};
pub use message::GossipMessage;
pub use peer::{Peer, PeerSet, PeerSetRecord, DEFAULT_PORT};
pub use server::{GossipServer, MessageHandler};
