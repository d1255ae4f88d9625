//! Ledger orchestration for peerchain.
//!
//! This crate brings together the pieces a single node needs locally:
//! - **Mempool**: ordered pool of pending transactions
//! - **Ledger**: the append-only chain, mining, and acceptance of peer blocks
//!
//! # Example
//!
//! ```rust
//! use peerchain_chain::Ledger;
//!
//! let mut ledger = Ledger::default();
//!
//! let tx = ledger.create_transaction(10.0, "alice", "bob");
//! assert_eq!(ledger.add_to_pending(tx), 2);
//!
//! let block = ledger.mine_block();
//! assert!(block.hash.starts_with("0000"));
//! assert!(ledger.pending().is_empty());
//! ```

pub mod ledger;
pub mod mempool;

// Re-export commonly used types
pub use ledger::{
    AddressSummary, Candidate, Ledger, LedgerConfig, LedgerError, TransactionLookup,
};
pub use mempool::Mempool;
