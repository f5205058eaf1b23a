//! Command-line interface
//!
//! Flags select the node's files, toggle mining and submit a transaction
//! or balance query before serving.

pub mod commands;

pub use commands::{ActionKindArg, Opt, TransRequest};
