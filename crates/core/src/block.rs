//! Block and candidate payload structures.

use crate::hash::{digest, GENESIS_HASH};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Nonce recorded on the genesis block.
pub const GENESIS_NONCE: u64 = 100;

/// The part of a block that proof-of-work commits to.
///
/// Field order is part of the hash input and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    /// Transactions captured from the pending pool.
    pub transactions: Vec<Transaction>,
    /// Index the block will occupy.
    pub index: u64,
}

/// A mined block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// 1-based position in the chain.
    pub index: u64,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
    /// Transactions included in this block.
    pub transactions: Vec<Transaction>,
    /// Proof-of-work solution.
    pub nonce: u64,
    /// Digest of (previous hash, payload, nonce).
    pub hash: String,
    /// Hash of the preceding block.
    pub previous_block_hash: String,
}

impl Block {
    /// Assemble a block from a solved candidate.
    pub fn new(data: BlockData, nonce: u64, hash: String, previous_block_hash: String) -> Self {
        Self {
            index: data.index,
            timestamp: current_timestamp(),
            transactions: data.transactions,
            nonce,
            hash,
            previous_block_hash,
        }
    }

    /// Create the genesis block.
    pub fn genesis() -> Self {
        Self {
            index: 1,
            timestamp: current_timestamp(),
            transactions: Vec::new(),
            nonce: GENESIS_NONCE,
            hash: GENESIS_HASH.to_string(),
            previous_block_hash: GENESIS_HASH.to_string(),
        }
    }

    /// Check if this block has the genesis shape.
    pub fn is_genesis(&self) -> bool {
        self.index == 1
            && self.nonce == GENESIS_NONCE
            && self.hash == GENESIS_HASH
            && self.previous_block_hash == GENESIS_HASH
            && self.transactions.is_empty()
    }

    /// Rebuild the candidate payload this block was mined from.
    pub fn data(&self) -> BlockData {
        BlockData {
            transactions: self.transactions.clone(),
            index: self.index,
        }
    }

    /// Recompute the digest from the block's own fields.
    pub fn compute_hash(&self) -> String {
        digest(&self.previous_block_hash, &self.data(), self.nonce)
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Current Unix time in milliseconds.
pub fn current_timestamp() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert!(genesis.is_genesis());
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.nonce, 100);
        assert_eq!(genesis.hash, "0");
        assert_eq!(genesis.previous_block_hash, "0");
        assert_eq!(genesis.tx_count(), 0);
    }

    #[test]
    fn test_block_data_field_order() {
        let data = BlockData {
            transactions: vec![],
            index: 2,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"transactions":[],"index":2}"#);
    }

    #[test]
    fn test_block_json_is_camel_case() {
        let value = serde_json::to_value(Block::genesis()).unwrap();
        assert_eq!(value["previousBlockHash"], "0");
        assert!(value.get("previous_block_hash").is_none());
    }

    #[test]
    fn test_compute_hash_matches_digest() {
        let tx = Transaction::new(3.0, "A", "B");
        let data = BlockData {
            transactions: vec![tx],
            index: 2,
        };
        let hash = digest("0", &data, 42);
        let block = Block::new(data, 42, hash.clone(), "0".to_string());

        assert_eq!(block.compute_hash(), hash);
        assert!(!block.is_genesis());
    }
}
