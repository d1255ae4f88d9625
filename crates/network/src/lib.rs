//! Peer registry and broadcast replication for peerchain.
//!
//! This crate turns a local [`Ledger`](peerchain_chain::Ledger) into a node
//! that keeps independent processes eventually consistent:
//! - **Peers**: the deduplicated, grow-only set of known peer addresses
//! - **Client**: the [`PeerClient`] seam and its `reqwest` implementation
//! - **Broadcast**: concurrent fan-out with per-peer outcomes
//! - **Node**: the transaction, block and registration protocols
//!
//! # Example
//!
//! ```rust,no_run
//! use peerchain_network::{HttpPeerClient, Node, NodeConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NodeConfig {
//!     node_url: "http://localhost:3001".to_string(),
//!     ..NodeConfig::default()
//! };
//! let client = HttpPeerClient::new(Duration::from_secs(5))?;
//! let node = Node::shared(config, client);
//!
//! node.register_and_broadcast_peer("http://localhost:3002").await;
//! node.create_and_broadcast_transaction(10.0, "alice", "bob").await;
//! let outcome = node.mine_and_broadcast().await?;
//! println!("mined block {}", outcome.block.index);
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod client;
pub mod message;
pub mod node;
pub mod peers;

// Re-export commonly used types
pub use broadcast::{fan_out, BroadcastReport, PeerFailure};
pub use client::{HttpPeerClient, PeerClient, PeerError};
pub use message::{
    BulkRegisterRequest, ChainSnapshot, NewBlockRequest, NewBlockResponse, NewNodeRequest,
    NewTransactionRequest,
};
pub use node::{
    ConsensusOutcome, MineOutcome, Node, NodeConfig, NodeError, RegistrationOutcome,
    TransactionBroadcast,
};
pub use peers::PeerRegistry;
