//! JSON bodies exchanged between nodes and with clients.

use peerchain_core::{Block, Transaction};
use serde::{Deserialize, Serialize};

/// Full view of a node's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    pub network_nodes: Vec<String>,
    pub current_node_url: String,
}

/// Request to create a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransactionRequest {
    pub amount: f64,
    pub sender: String,
    pub recipient: String,
}

/// Block pushed to a peer after mining.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlockRequest {
    pub new_block: Block,
}

/// Peer's verdict on a pushed block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlockResponse {
    pub note: String,
    pub accepted: bool,
}

/// Single node registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNodeRequest {
    pub new_node_url: String,
}

/// Bulk node registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegisterRequest {
    pub all_network_nodes: Vec<String>,
}
