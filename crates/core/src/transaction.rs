//! Transaction type.

use crate::hash::random_id;
use serde::{Deserialize, Serialize};

/// A value transfer between two free-form identifiers.
///
/// Nothing about the sender or recipient is checked; amounts carry no
/// currency semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Amount transferred.
    pub amount: f64,
    /// Sender identifier.
    pub sender: String,
    /// Recipient identifier.
    pub recipient: String,
    /// Unique transaction id.
    #[serde(rename = "transactionId")]
    pub id: String,
}

impl Transaction {
    /// Create a new transaction with a fresh id.
    pub fn new(amount: f64, sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            amount,
            sender: sender.into(),
            recipient: recipient.into(),
            id: random_id(),
        }
    }

    /// Check whether `address` is the sender or the recipient.
    pub fn involves(&self, address: &str) -> bool {
        self.sender == address || self.recipient == address
    }

    /// Signed effect of this transaction on `address`'s balance.
    pub fn balance_delta(&self, address: &str) -> f64 {
        let mut delta = 0.0;
        if self.recipient == address {
            delta += self.amount;
        }
        if self.sender == address {
            delta -= self.amount;
        }
        delta
    }
}
