//! Shared fixtures for unit tests
//!
//! Cheap identities and easy consensus parameters so tests that mine and
//! sign stay fast.

pub mod test_utils;

pub use test_utils::*;
