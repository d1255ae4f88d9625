//! Block and chain validation rules.
//!
//! Incoming blocks are checked for linkage to the local tip. Whole chains
//! (used when adopting a longer chain from a peer) are also checked for the
//! genesis shape and the proof of every mined block.

use crate::pow::{PowError, ProofOfWork};
use peerchain_core::Block;
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block index mismatch (expected {expected}, got {got})")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("block previous hash mismatch (expected {expected}, got {got})")]
    InvalidPreviousHash { expected: String, got: String },

    #[error("invalid proof of work: {0}")]
    InvalidProof(#[from] PowError),

    #[error("chain does not start with the genesis block")]
    InvalidGenesis,

    #[error("chain is empty")]
    EmptyChain,

    #[error("invalid block at index {index}: {source}")]
    InvalidChainBlock {
        index: u64,
        #[source]
        source: Box<ValidationError>,
    },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// Validate that `block` directly extends `parent`.
    pub fn validate_block_extends_parent(block: &Block, parent: &Block) -> Result<()> {
        if block.previous_block_hash != parent.hash {
            return Err(ValidationError::InvalidPreviousHash {
                expected: parent.hash.clone(),
                got: block.previous_block_hash.clone(),
            });
        }

        if block.index != parent.index + 1 {
            return Err(ValidationError::InvalidIndex {
                expected: parent.index + 1,
                got: block.index,
            });
        }

        Ok(())
    }

    /// Validate that the block hash is its own digest and meets the target.
    pub fn validate_proof(block: &Block, pow: &ProofOfWork) -> Result<()> {
        pow.verify(
            &block.previous_block_hash,
            &block.data(),
            block.nonce,
            &block.hash,
        )?;
        Ok(())
    }

    /// Full block validation (parent link + proof).
    pub fn validate_full(block: &Block, parent: &Block, pow: &ProofOfWork) -> Result<()> {
        Self::validate_block_extends_parent(block, parent)?;
        Self::validate_proof(block, pow)?;
        Ok(())
    }
}

/// Whole-chain validator.
pub struct ChainValidator;

impl ChainValidator {
    /// Validate a complete chain from genesis to tip.
    pub fn validate_chain(chain: &[Block], pow: &ProofOfWork) -> Result<()> {
        let (genesis, rest) = chain.split_first().ok_or(ValidationError::EmptyChain)?;
        if !genesis.is_genesis() {
            return Err(ValidationError::InvalidGenesis);
        }

        let mut parent = genesis;
        for block in rest {
            BlockValidator::validate_full(block, parent, pow).map_err(|e| {
                ValidationError::InvalidChainBlock {
                    index: block.index,
                    source: Box::new(e),
                }
            })?;
            parent = block;
        }

        Ok(())
    }

    /// Convenience wrapper returning a plain boolean.
    pub fn is_chain_valid(chain: &[Block], pow: &ProofOfWork) -> bool {
        Self::validate_chain(chain, pow).is_ok()
    }
}
