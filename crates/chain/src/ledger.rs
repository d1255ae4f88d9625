//! The ledger: an append-only chain plus the pending pool.
//!
//! Mining happens in two steps so the proof search can run without holding
//! the ledger: [`Ledger::prepare_candidate`] snapshots the pool and tip, and
//! [`Ledger::commit_candidate`] appends the solved block if the tip has not
//! moved in the meantime. [`Ledger::mine_block`] does both in one call.

use crate::mempool::Mempool;
use peerchain_consensus::{BlockValidator, ChainValidator, ProofOfWork, ValidationError};
use peerchain_core::{digest, Block, BlockData, Transaction, DIFFICULTY_PREFIX};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("candidate is stale (mined on {candidate}, tip is now {tip})")]
    StaleCandidate { candidate: String, tip: String },

    #[error("replacement chain is not longer (ours {ours}, theirs {theirs})")]
    ChainNotLonger { ours: usize, theirs: usize },
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Also check the proof of work of blocks received from peers.
    ///
    /// Off by default: incoming blocks are accepted on linkage alone.
    pub verify_incoming_proof: bool,
    /// Leading characters a mined block hash must have.
    pub difficulty_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            verify_incoming_proof: false,
            difficulty_prefix: DIFFICULTY_PREFIX.to_string(),
        }
    }
}

/// A block candidate waiting for its proof of work.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Hash of the tip the candidate extends.
    pub previous_hash: String,
    /// Payload the proof commits to.
    pub data: BlockData,
}

/// Where a transaction was found.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLookup {
    pub transaction: Transaction,
    /// Containing block, `None` while still pending.
    pub block: Option<Block>,
}

/// Transactions touching an address and its net balance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSummary {
    pub address_transactions: Vec<Transaction>,
    pub address_balance: f64,
}

/// Chain and pending pool owned by one node.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Vec<Block>,
    mempool: Mempool,
    pow: ProofOfWork,
    config: LedgerConfig,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl Ledger {
    /// Create a ledger holding only the genesis block.
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            chain: vec![Block::genesis()],
            mempool: Mempool::new(),
            pow: ProofOfWork::new(config.difficulty_prefix.clone()),
            config,
        }
    }

    /// All blocks, genesis first.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Pending transactions in arrival order.
    pub fn pending(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    /// The proof-of-work engine used by this ledger.
    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// The most recently appended block.
    pub fn last_block(&self) -> &Block {
        // The chain always starts with genesis and never shrinks.
        &self.chain[self.chain.len() - 1]
    }

    /// Index the next block will occupy.
    pub fn next_index(&self) -> u64 {
        self.last_block().index + 1
    }

    /// Build a new transaction. Does not touch the pool.
    pub fn create_transaction(
        &self,
        amount: f64,
        sender: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Transaction {
        Transaction::new(amount, sender, recipient)
    }

    /// Append a transaction to the pool and return the index of the block it
    /// will land in.
    pub fn add_to_pending(&mut self, tx: Transaction) -> u64 {
        debug!(id = %tx.id, amount = tx.amount, "transaction added to pending pool");
        self.mempool.add(tx);
        self.next_index()
    }

    /// Snapshot the pool and tip as a block candidate.
    pub fn prepare_candidate(&self) -> Candidate {
        Candidate {
            previous_hash: self.last_block().hash.clone(),
            data: BlockData {
                transactions: self.pending().to_vec(),
                index: self.next_index(),
            },
        }
    }

    /// Append a solved candidate.
    ///
    /// Fails if another block was appended since the candidate was prepared.
    /// Only the captured transactions leave the pool; anything that arrived
    /// during the search stays pending.
    pub fn commit_candidate(&mut self, candidate: Candidate, nonce: u64) -> Result<&Block> {
        let tip = self.last_block();
        if tip.hash != candidate.previous_hash || tip.index + 1 != candidate.data.index {
            return Err(LedgerError::StaleCandidate {
                candidate: candidate.previous_hash,
                tip: tip.hash.clone(),
            });
        }
        Ok(self.append_mined(candidate, nonce))
    }

    /// Snapshot, solve and append in one step. Leaves the pool empty.
    pub fn mine_block(&mut self) -> &Block {
        let candidate = self.prepare_candidate();
        let nonce = self.pow.solve(&candidate.previous_hash, &candidate.data);
        self.append_mined(candidate, nonce)
    }

    fn append_mined(&mut self, candidate: Candidate, nonce: u64) -> &Block {
        let hash = digest(&candidate.previous_hash, &candidate.data, nonce);
        let captured: Vec<String> = candidate
            .data
            .transactions
            .iter()
            .map(|tx| tx.id.clone())
            .collect();
        self.mempool.remove_batch(captured.iter().map(String::as_str));

        let block = Block::new(candidate.data, nonce, hash, candidate.previous_hash);
        info!(
            index = block.index,
            hash = %block.hash,
            txs = block.tx_count(),
            "mined block"
        );
        self.chain.push(block);
        self.last_block()
    }

    /// Accept a block from a peer if it extends the local tip.
    ///
    /// On success the block is appended and the pending pool is reset to
    /// empty, even for transactions the block does not contain. On failure
    /// nothing changes.
    pub fn receive_block(&mut self, block: Block) -> Result<()> {
        let tip = self.last_block();
        BlockValidator::validate_block_extends_parent(&block, tip)?;
        if self.config.verify_incoming_proof {
            BlockValidator::validate_proof(&block, &self.pow)?;
        }

        info!(index = block.index, hash = %block.hash, "accepted block from peer");
        self.chain.push(block);
        self.mempool.clear();
        Ok(())
    }

    /// Adopt `chain` and `pending` if `chain` is valid and strictly longer.
    pub fn replace_chain(&mut self, chain: Vec<Block>, pending: Vec<Transaction>) -> Result<()> {
        if chain.len() <= self.chain.len() {
            return Err(LedgerError::ChainNotLonger {
                ours: self.chain.len(),
                theirs: chain.len(),
            });
        }
        ChainValidator::validate_chain(&chain, &self.pow)?;

        info!(
            old_len = self.chain.len(),
            new_len = chain.len(),
            "replaced chain with longer valid chain"
        );
        self.chain = chain;
        self.mempool.replace(pending);
        Ok(())
    }

    /// Check this ledger's own chain.
    pub fn is_valid(&self) -> bool {
        ChainValidator::is_chain_valid(&self.chain, &self.pow)
    }

    /// Find a block by hash.
    pub fn find_block(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|block| block.hash == hash)
    }

    /// Find a transaction by id, in the chain or the pool.
    pub fn find_transaction(&self, id: &str) -> Option<TransactionLookup> {
        for block in &self.chain {
            if let Some(tx) = block.transactions.iter().find(|tx| tx.id == id) {
                return Some(TransactionLookup {
                    transaction: tx.clone(),
                    block: Some(block.clone()),
                });
            }
        }
        self.mempool.get(id).map(|tx| TransactionLookup {
            transaction: tx.clone(),
            block: None,
        })
    }

    /// Collect every transaction touching `address`, pending ones included.
    pub fn address_summary(&self, address: &str) -> AddressSummary {
        let address_transactions: Vec<Transaction> = self
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .chain(self.pending().iter())
            .filter(|tx| tx.involves(address))
            .cloned()
            .collect();
        let address_balance = address_transactions
            .iter()
            .map(|tx| tx.balance_delta(address))
            .sum();

        AddressSummary {
            address_transactions,
            address_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mined_elsewhere(ledger: &Ledger) -> Block {
        let mut other = ledger.clone();
        other.mine_block().clone()
    }

    #[test]
    fn test_fresh_ledger() {
        let ledger = Ledger::default();

        assert_eq!(ledger.chain().len(), 1);
        assert_eq!(ledger.chain()[0].index, 1);
        assert_eq!(ledger.chain()[0].previous_block_hash, "0");
        assert!(ledger.last_block().is_genesis());
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_add_to_pending_returns_next_index() {
        let mut ledger = Ledger::default();
        let tx = ledger.create_transaction(10.0, "A", "B");

        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.add_to_pending(tx.clone()), 2);
        assert_eq!(ledger.pending(), &[tx]);
    }

    #[test]
    fn test_mine_block() {
        let mut ledger = Ledger::default();
        let tx1 = ledger.create_transaction(10.0, "A", "B");
        let tx2 = ledger.create_transaction(5.0, "B", "C");
        ledger.add_to_pending(tx1);
        ledger.add_to_pending(tx2);
        let snapshot = ledger.pending().to_vec();

        let block = ledger.mine_block().clone();

        assert_eq!(ledger.chain().len(), 2);
        assert_eq!(block.index, 2);
        assert_eq!(block.previous_block_hash, ledger.chain()[0].hash);
        assert!(block.hash.starts_with("0000"));
        assert_eq!(block.hash, block.compute_hash());
        assert_eq!(block.transactions, snapshot);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_mined_chain_links() {
        let mut ledger = Ledger::default();
        for i in 0..3 {
            let tx = ledger.create_transaction(i as f64, "A", "B");
            ledger.add_to_pending(tx);
            ledger.mine_block();
        }

        let chain = ledger.chain();
        for pair in chain.windows(2) {
            assert_eq!(pair[1].previous_block_hash, pair[0].hash);
            assert_eq!(pair[1].index, pair[0].index + 1);
        }
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_commit_keeps_late_transactions() {
        let mut ledger = Ledger::default();
        let early = ledger.create_transaction(1.0, "A", "B");
        ledger.add_to_pending(early.clone());

        let candidate = ledger.prepare_candidate();
        let nonce = ledger.pow().solve(&candidate.previous_hash, &candidate.data);

        let late = ledger.create_transaction(2.0, "A", "B");
        ledger.add_to_pending(late.clone());

        let block = ledger.commit_candidate(candidate, nonce).unwrap().clone();
        assert_eq!(block.transactions, vec![early]);
        assert_eq!(ledger.pending(), &[late]);
    }

    #[test]
    fn test_commit_rejects_stale_candidate() {
        let mut ledger = Ledger::default();
        let candidate = ledger.prepare_candidate();
        let nonce = ledger.pow().solve(&candidate.previous_hash, &candidate.data);

        ledger.mine_block();

        assert!(matches!(
            ledger.commit_candidate(candidate, nonce),
            Err(LedgerError::StaleCandidate { .. })
        ));
        assert_eq!(ledger.chain().len(), 2);
    }

    #[test]
    fn test_receive_block_accepts_and_resets_pool() {
        let mut ledger = Ledger::default();
        let block = mined_elsewhere(&ledger);
        let tx = ledger.create_transaction(3.0, "X", "Y");
        ledger.add_to_pending(tx);

        assert!(ledger.receive_block(block.clone()).is_ok());
        assert_eq!(ledger.chain().len(), 2);
        assert_eq!(ledger.last_block(), &block);
        assert!(ledger.pending().is_empty());
    }

    #[test]
    fn test_receive_block_rejection_is_side_effect_free() {
        let mut ledger = Ledger::default();
        let mut block = mined_elsewhere(&ledger);
        block.previous_block_hash = "not-the-tip".to_string();
        let tx = ledger.create_transaction(3.0, "X", "Y");
        ledger.add_to_pending(tx.clone());

        assert!(matches!(
            ledger.receive_block(block),
            Err(LedgerError::Validation(
                ValidationError::InvalidPreviousHash { .. }
            ))
        ));
        assert_eq!(ledger.chain().len(), 1);
        assert_eq!(ledger.pending(), &[tx]);
    }

    #[test]
    fn test_receive_block_wrong_index_rejected() {
        let mut ledger = Ledger::default();
        let mut block = mined_elsewhere(&ledger);
        block.index = 3;

        assert!(ledger.receive_block(block).is_err());
        assert_eq!(ledger.chain().len(), 1);
    }

    #[test]
    fn test_receive_block_ignores_proof_by_default() {
        let mut ledger = Ledger::default();
        let mut block = mined_elsewhere(&ledger);
        block.nonce += 1;

        assert!(ledger.receive_block(block).is_ok());
    }

    #[test]
    fn test_receive_block_strict_proof() {
        let mut ledger = Ledger::new(LedgerConfig {
            verify_incoming_proof: true,
            ..LedgerConfig::default()
        });
        let mut block = mined_elsewhere(&ledger);
        block.nonce += 1;

        assert!(matches!(
            ledger.receive_block(block),
            Err(LedgerError::Validation(ValidationError::InvalidProof(_)))
        ));
        assert_eq!(ledger.chain().len(), 1);
    }

    #[test]
    fn test_replace_chain() {
        let mut ledger = Ledger::default();
        let mut longer = ledger.clone();
        longer.mine_block();
        let tx = longer.create_transaction(1.0, "A", "B");
        longer.add_to_pending(tx.clone());

        assert!(matches!(
            longer.clone().replace_chain(ledger.chain().to_vec(), vec![]),
            Err(LedgerError::ChainNotLonger { ours: 2, theirs: 1 })
        ));

        ledger
            .replace_chain(longer.chain().to_vec(), longer.pending().to_vec())
            .unwrap();
        assert_eq!(ledger.chain(), longer.chain());
        assert_eq!(ledger.pending(), &[tx]);
    }

    #[test]
    fn test_replace_chain_rejects_invalid() {
        let mut ledger = Ledger::default();
        let mut other = ledger.clone();
        other.mine_block();
        let mut forged = other.chain().to_vec();
        forged[1].nonce += 1;

        assert!(matches!(
            ledger.replace_chain(forged, vec![]),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(ledger.chain().len(), 1);
    }

    #[test]
    fn test_lookups() {
        let mut ledger = Ledger::default();
        let mined = ledger.create_transaction(10.0, "alice", "bob");
        ledger.add_to_pending(mined.clone());
        let block = ledger.mine_block().clone();
        let pending = ledger.create_transaction(4.0, "bob", "carol");
        ledger.add_to_pending(pending.clone());

        assert_eq!(ledger.find_block(&block.hash), Some(&block));
        assert!(ledger.find_block("nope").is_none());

        let found = ledger.find_transaction(&mined.id).unwrap();
        assert_eq!(found.block.as_ref().map(|b| b.index), Some(2));
        let found = ledger.find_transaction(&pending.id).unwrap();
        assert!(found.block.is_none());

        let bob = ledger.address_summary("bob");
        assert_eq!(bob.address_transactions.len(), 2);
        assert_eq!(bob.address_balance, 6.0);
    }

    #[test]
    fn test_difficulty_from_config() {
        let mut ledger = Ledger::new(LedgerConfig {
            difficulty_prefix: "00".to_string(),
            ..LedgerConfig::default()
        });
        let block = ledger.mine_block().clone();

        assert_eq!(ledger.pow().prefix(), "00");
        assert!(block.hash.starts_with("00"));
        assert_eq!(Ledger::default().pow().prefix(), "0000");
    }
}
