//! Configuration management
//!
//! Node settings come from an optional TOML file, then the `NODE_ADDRESS`
//! and `NODE_PORT` environment variables, then command-line flags.

pub mod settings;

pub use settings::{Config, BOOTSTRAP_PEERS};
