//! Node orchestration
//!
//! Routes inbound gossip into the chain store, runs the mining loop and
//! persists state after every change.

pub mod orchestrator;

pub use orchestrator::{MiningState, MiningTiming, Node, NodePaths};
