//! Proof-of-Work consensus for peerchain.
//!
//! This crate provides:
//! - A deterministic, cancellable nonce search against a fixed hash prefix
//! - Block validation (parent links, proof checks)
//! - Whole-chain validation for longest-chain adoption
//!
//! # Example
//!
//! ```rust
//! use peerchain_consensus::{BlockValidator, ProofOfWork};
//! use peerchain_core::{digest, Block, BlockData};
//!
//! let pow = ProofOfWork::default();
//! let genesis = Block::genesis();
//!
//! let data = BlockData { transactions: vec![], index: genesis.index + 1 };
//! let nonce = pow.solve(&genesis.hash, &data);
//! let hash = digest(&genesis.hash, &data, nonce);
//! let block = Block::new(data, nonce, hash, genesis.hash.clone());
//!
//! BlockValidator::validate_full(&block, &genesis, &pow).unwrap();
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{CancelFlag, PowError, ProofOfWork};
pub use validator::{BlockValidator, ChainValidator, ValidationError};
