use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::Peer;
use crate::wallet::short;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What travels between nodes. Serialized as a single-key object:
/// `{"peers": [...]}`, `{"block": {...}}` or `{"trans": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GossipMessage {
    Peers(Vec<Peer>),
    Block(Block),
    Trans(Transaction),
}

impl GossipMessage {
    /// Decode one JSON value read off the wire
    pub fn from_value(value: Value) -> Result<GossipMessage> {
        serde_json::from_value(value).map_err(|e| BlockchainError::MalformedMessage(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GossipMessage::Peers(_) => "peers",
            GossipMessage::Block(_) => "block",
            GossipMessage::Trans(_) => "trans",
        }
    }
}

impl fmt::Display for GossipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GossipMessage::Peers(peers) => write!(f, "peers ({} entries)", peers.len()),
            GossipMessage::Block(block) => write!(f, "block {}", short(block.get_hash())),
            GossipMessage::Trans(tx) => write!(f, "trans {}", short(tx.hash())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::test_identity;
    use serde_json::json;

    #[test]
    fn test_wire_shape_is_single_key() {
        let message = GossipMessage::Peers(vec![Peer::new("::1", 10000)]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"peers": [{"ipv6": "::1", "port": 10000}]}));
        assert_eq!(message.kind(), "peers");
    }

    #[test]
    fn test_block_message_decodes_and_recomputes_hash() {
        let solver = test_identity();
        let block = Block::template(None, solver.address().to_string()).unwrap();
        let bytes = GossipMessage::Block(block.clone()).to_bytes().unwrap();

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value["block"].get("hash").is_none());
        match GossipMessage::from_value(value).unwrap() {
            GossipMessage::Block(decoded) => assert_eq!(decoded.get_hash(), block.get_hash()),
            other => panic!("unexpected message {other}"),
        }
    }

    #[test]
    fn test_unknown_or_mixed_keys_are_malformed() {
        for value in [
            json!({"hello": 1}),
            json!({"peers": [], "trans": {}}),
            json!([1, 2, 3]),
            json!({"peers": "not a list"}),
        ] {
            assert!(matches!(
                GossipMessage::from_value(value),
                Err(BlockchainError::MalformedMessage(_))
            ));
        }
    }
}
