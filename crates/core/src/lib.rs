//! Core ledger primitives for peerchain.
//!
//! This crate provides the fundamental types used throughout the node:
//! - Block hashing and the difficulty predicate
//! - Transactions
//! - Blocks and candidate payloads

pub mod block;
pub mod hash;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{current_timestamp, Block, BlockData, GENESIS_NONCE};
pub use hash::{digest, meets_difficulty, random_id, DIFFICULTY_PREFIX, GENESIS_HASH};
pub use transaction::Transaction;
