//! Pending transaction pool.
//!
//! The pool stores transactions waiting to be included in a block, in
//! arrival order. Transactions are not validated on entry.

use peerchain_core::Transaction;
use std::collections::HashSet;

/// Ordered pool of pending transactions.
#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Append a transaction.
    pub fn add(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Look up a pending transaction by id.
    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Pending transactions in arrival order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Remove every transaction whose id is in `ids`, keeping the rest in order.
    pub fn remove_batch<'a, I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids: HashSet<&str> = ids.into_iter().collect();
        self.transactions.retain(|tx| !ids.contains(tx.id.as_str()));
    }

    /// Replace the pool contents wholesale.
    pub fn replace(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }

    /// Clear all transactions from the pool.
    pub fn clear(&mut self) {
        self.transactions.clear();
    }
}
