//! A replicating node: one ledger and one peer registry behind a single lock,
//! plus the broadcast protocols that keep peers in step.
//!
//! Every protocol follows the same shape: mutate local state under the lock,
//! release it, then fan the change out to peers. The lock is never held across
//! a network call, and a failing peer never rolls back local state.

use crate::broadcast::{fan_out, BroadcastReport};
use crate::client::{PeerClient, PeerError};
use crate::message::ChainSnapshot;
use crate::peers::PeerRegistry;
use peerchain_chain::{AddressSummary, Ledger, LedgerConfig, LedgerError, TransactionLookup};
use peerchain_consensus::{CancelFlag, PowError};
use peerchain_core::{random_id, Block, Transaction};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors that can occur during node operations.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("a block is already being mined on this node")]
    MiningInProgress,

    #[error("mining interrupted: {0}")]
    MiningInterrupted(#[from] PowError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("mining task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address peers use to reach this node.
    pub node_url: String,
    /// Recipient of mining rewards.
    pub reward_address: String,
    /// Amount paid for each mined block.
    pub mining_reward: f64,
    /// Sender recorded on reward transactions.
    pub reward_sender: String,
    /// Upper bound on each individual peer call.
    pub peer_timeout: Duration,
    /// Ledger settings.
    pub ledger: LedgerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_url: "http://localhost:3001".to_string(),
            reward_address: random_id(),
            mining_reward: 12.5,
            reward_sender: "00".to_string(),
            peer_timeout: Duration::from_secs(5),
            ledger: LedgerConfig::default(),
        }
    }
}

/// Result of creating and broadcasting a transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBroadcast {
    pub transaction: Transaction,
    pub block_index: u64,
    pub report: BroadcastReport,
}

/// Result of mining a block and broadcasting it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineOutcome {
    pub block: Block,
    pub block_broadcast: BroadcastReport,
    pub reward: TransactionBroadcast,
}

/// Result of registering a new peer and introducing it to the network.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    /// Whether the address was new to this node.
    pub registered: bool,
    /// `register-node` calls to the peers already known.
    pub broadcast: BroadcastReport,
    /// The single bulk registration sent to the new peer.
    pub bulk_register: BroadcastReport,
}

/// Result of a longest-chain round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusOutcome {
    pub replaced: bool,
    pub chain_length: usize,
    pub report: BroadcastReport,
}

struct NodeState {
    ledger: Ledger,
    peers: PeerRegistry,
    /// Cancel flag of the proof search in flight, if any.
    search: Option<CancelFlag>,
}

/// A ledger node that replicates its changes to peers through `C`.
pub struct Node<C: PeerClient> {
    config: NodeConfig,
    state: Mutex<NodeState>,
    client: C,
    is_mining: AtomicBool,
}

/// Stops the proof search and clears the mining flag however the mining
/// call exits, including when its future is dropped mid-search.
struct MiningGuard<'a> {
    mining: &'a AtomicBool,
    search: CancelFlag,
}

impl Drop for MiningGuard<'_> {
    fn drop(&mut self) {
        self.search.cancel();
        self.mining.store(false, Ordering::SeqCst);
    }
}

impl<C: PeerClient> Node<C> {
    /// Create a node with a fresh genesis-only ledger and no peers.
    pub fn new(config: NodeConfig, client: C) -> Self {
        let state = NodeState {
            ledger: Ledger::new(config.ledger.clone()),
            peers: PeerRegistry::new(config.node_url.clone()),
            search: None,
        };
        Self {
            config,
            state: Mutex::new(state),
            client,
            is_mining: AtomicBool::new(false),
        }
    }

    /// Create a node wrapped in an [`Arc`], ready to share with handlers.
    pub fn shared(config: NodeConfig, client: C) -> Arc<Self> {
        Arc::new(Self::new(config, client))
    }

    /// This node's own address.
    pub fn node_url(&self) -> &str {
        &self.config.node_url
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Check if a block is being mined right now.
    pub fn is_mining(&self) -> bool {
        self.is_mining.load(Ordering::SeqCst)
    }

    /// Copy of the chain, pool and peer set.
    pub async fn snapshot(&self) -> ChainSnapshot {
        let state = self.state.lock().await;
        ChainSnapshot {
            chain: state.ledger.chain().to_vec(),
            pending_transactions: state.ledger.pending().to_vec(),
            network_nodes: state.peers.list(),
            current_node_url: self.config.node_url.clone(),
        }
    }

    /// Known peers.
    pub async fn peers(&self) -> Vec<String> {
        self.state.lock().await.peers.list()
    }

    /// Create a transaction and add it to the local pool only.
    ///
    /// Returns the index of the block it will land in.
    pub async fn create_transaction(&self, amount: f64, sender: &str, recipient: &str) -> u64 {
        let mut state = self.state.lock().await;
        let tx = state.ledger.create_transaction(amount, sender, recipient);
        state.ledger.add_to_pending(tx)
    }

    /// Accept a transaction created elsewhere into the local pool.
    pub async fn receive_transaction(&self, tx: Transaction) -> u64 {
        self.state.lock().await.ledger.add_to_pending(tx)
    }

    /// Create a transaction, add it locally, then hand it to every peer.
    pub async fn create_and_broadcast_transaction(
        &self,
        amount: f64,
        sender: &str,
        recipient: &str,
    ) -> TransactionBroadcast {
        let (transaction, block_index, peers) = {
            let mut state = self.state.lock().await;
            let tx = state.ledger.create_transaction(amount, sender, recipient);
            let block_index = state.ledger.add_to_pending(tx.clone());
            (tx, block_index, state.peers.list())
        };

        let shared = Arc::new(transaction.clone());
        let results = fan_out(peers, self.config.peer_timeout, |peer| {
            let client = self.client.clone();
            let tx = shared.clone();
            async move { client.send_transaction(&peer, &tx).await }
        })
        .await;

        let report = BroadcastReport::from_results(results);
        info!(
            id = %transaction.id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "broadcast transaction"
        );
        TransactionBroadcast {
            transaction,
            block_index,
            report,
        }
    }

    /// Mine a block on the current pool without telling anyone.
    ///
    /// The proof search runs on the blocking pool with the lock released. If a
    /// peer block is accepted meanwhile, the search is cancelled and this
    /// returns [`NodeError::MiningInterrupted`].
    pub async fn mine(&self) -> Result<Block> {
        if self
            .is_mining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(NodeError::MiningInProgress);
        }
        let cancel = CancelFlag::new();
        let _guard = MiningGuard {
            mining: &self.is_mining,
            search: cancel.clone(),
        };

        let (candidate, pow) = {
            let mut state = self.state.lock().await;
            state.search = Some(cancel.clone());
            (state.ledger.prepare_candidate(), state.ledger.pow().clone())
        };
        debug!(index = candidate.data.index, "starting proof-of-work search");

        let search = {
            let candidate = candidate.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                pow.solve_cancellable(&candidate.previous_hash, &candidate.data, &cancel)
            })
        };
        let solved = search.await;

        let mut state = self.state.lock().await;
        state.search = None;
        let nonce = solved.map_err(|e| NodeError::Task(e.to_string()))??;
        let block = state.ledger.commit_candidate(candidate, nonce)?.clone();
        Ok(block)
    }

    /// Mine a block, push it to every peer, then broadcast the reward.
    ///
    /// The reward goes through [`Node::create_and_broadcast_transaction`] like
    /// any other transaction, so it reaches peers' pools too.
    pub async fn mine_and_broadcast(&self) -> Result<MineOutcome> {
        let block = self.mine().await?;
        let peers = self.peers().await;

        let shared = Arc::new(block.clone());
        let results = fan_out(peers, self.config.peer_timeout, |peer| {
            let client = self.client.clone();
            let block = shared.clone();
            async move {
                if client.send_block(&peer, &block).await? {
                    Ok(())
                } else {
                    Err(PeerError::Rejected { peer })
                }
            }
        })
        .await;
        let block_broadcast = BroadcastReport::from_results(results);
        info!(
            index = block.index,
            accepted = block_broadcast.succeeded.len(),
            failed = block_broadcast.failed.len(),
            "broadcast block"
        );

        let reward = self
            .create_and_broadcast_transaction(
                self.config.mining_reward,
                &self.config.reward_sender,
                &self.config.reward_address,
            )
            .await;

        Ok(MineOutcome {
            block,
            block_broadcast,
            reward,
        })
    }

    /// Accept a block from a peer if it extends the local tip.
    ///
    /// On acceptance any local proof search is cancelled, since its candidate
    /// can no longer be committed.
    pub async fn receive_block(&self, block: Block) -> bool {
        let mut state = self.state.lock().await;
        let index = block.index;
        match state.ledger.receive_block(block) {
            Ok(()) => {
                if let Some(search) = state.search.take() {
                    search.cancel();
                }
                true
            }
            Err(e) => {
                warn!(index, error = %e, "rejected block from peer");
                false
            }
        }
    }

    /// Register a peer locally. Returns `false` if it was already known or is
    /// this node.
    pub async fn register_peer(&self, address: &str) -> bool {
        let added = self.state.lock().await.peers.register(address);
        if added {
            info!(peer = %address, "registered peer");
        }
        added
    }

    /// Register many peers locally. Returns how many were new.
    pub async fn register_peers_bulk(&self, addresses: &[String]) -> usize {
        let added = self
            .state
            .lock()
            .await
            .peers
            .register_bulk(addresses.iter().map(String::as_str));
        debug!(added, offered = addresses.len(), "bulk peer registration");
        added
    }

    /// Register a new peer, tell every known peer about it, then send it the
    /// whole network in one bulk call.
    pub async fn register_and_broadcast_peer(&self, address: &str) -> RegistrationOutcome {
        if address == self.config.node_url {
            return RegistrationOutcome {
                registered: false,
                broadcast: BroadcastReport::default(),
                bulk_register: BroadcastReport::default(),
            };
        }

        let (registered, existing) = {
            let mut state = self.state.lock().await;
            let existing: Vec<String> = state
                .peers
                .list()
                .into_iter()
                .filter(|peer| peer != address)
                .collect();
            (state.peers.register(address), existing)
        };

        let new_peer = Arc::new(address.to_string());
        let results = fan_out(existing, self.config.peer_timeout, |peer| {
            let client = self.client.clone();
            let new_peer = new_peer.clone();
            async move { client.register_peer(&peer, &new_peer).await }
        })
        .await;
        let broadcast = BroadcastReport::from_results(results);

        let mut network = self.peers().await;
        network.retain(|peer| peer != address);
        network.push(self.config.node_url.clone());
        let network = Arc::new(network);
        let results = fan_out(vec![address.to_string()], self.config.peer_timeout, |peer| {
            let client = self.client.clone();
            let network = network.clone();
            async move { client.register_peers_bulk(&peer, &network).await }
        })
        .await;
        let bulk_register = BroadcastReport::from_results(results);

        info!(
            peer = %address,
            registered,
            notified = broadcast.succeeded.len(),
            "introduced peer to network"
        );
        RegistrationOutcome {
            registered,
            broadcast,
            bulk_register,
        }
    }

    /// Join an existing network by announcing this node to `seed`.
    pub async fn join(&self, seed: &str) -> std::result::Result<(), PeerError> {
        let result = tokio::time::timeout(
            self.config.peer_timeout,
            self.client.announce(seed, &self.config.node_url),
        )
        .await
        .unwrap_or_else(|_| {
            Err(PeerError::Timeout {
                peer: seed.to_string(),
            })
        });
        match &result {
            Ok(()) => info!(seed = %seed, "joined network"),
            Err(e) => warn!(seed = %seed, error = %e, "failed to join network"),
        }
        result
    }

    /// Adopt the longest valid chain held by any peer, if longer than ours.
    pub async fn resolve_conflicts(&self) -> ConsensusOutcome {
        let peers = self.peers().await;
        let results = fan_out(peers, self.config.peer_timeout, |peer| {
            let client = self.client.clone();
            async move { client.fetch_snapshot(&peer).await }
        })
        .await;

        let mut candidates = Vec::new();
        let mut report = BroadcastReport::default();
        for (peer, result) in results {
            match result {
                Ok(snapshot) => {
                    report.succeeded.push(peer);
                    candidates.push(snapshot);
                }
                Err(e) => report.record::<()>(peer, Err(e)),
            }
        }
        candidates.sort_by(|a, b| b.chain.len().cmp(&a.chain.len()));

        let mut state = self.state.lock().await;
        let mut replaced = false;
        for candidate in candidates {
            if candidate.chain.len() <= state.ledger.chain().len() {
                break;
            }
            match state
                .ledger
                .replace_chain(candidate.chain, candidate.pending_transactions)
            {
                Ok(()) => {
                    replaced = true;
                    break;
                }
                Err(e) => warn!(
                    peer = %candidate.current_node_url,
                    error = %e,
                    "ignoring peer chain"
                ),
            }
        }
        if replaced {
            if let Some(search) = state.search.take() {
                search.cancel();
            }
        }

        ConsensusOutcome {
            replaced,
            chain_length: state.ledger.chain().len(),
            report,
        }
    }

    /// Find a block by hash.
    pub async fn block(&self, hash: &str) -> Option<Block> {
        self.state.lock().await.ledger.find_block(hash).cloned()
    }

    /// Find a transaction by id.
    pub async fn transaction(&self, id: &str) -> Option<TransactionLookup> {
        self.state.lock().await.ledger.find_transaction(id)
    }

    /// Summarize activity for an address.
    pub async fn address(&self, address: &str) -> AddressSummary {
        self.state.lock().await.ledger.address_summary(address)
    }

    /// Stop any in-flight proof search.
    pub async fn shutdown(&self) {
        if let Some(search) = self.state.lock().await.search.take() {
            info!("cancelling in-flight proof-of-work search");
            search.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Client for a node with no reachable peers.
    #[derive(Clone)]
    struct Offline;

    fn offline(peer: &str) -> PeerError {
        PeerError::UnknownPeer(peer.to_string())
    }

    impl PeerClient for Offline {
        async fn send_transaction(&self, peer: &str, _: &Transaction) -> crate::client::Result<()> {
            Err(offline(peer))
        }

        async fn send_block(&self, peer: &str, _: &Block) -> crate::client::Result<bool> {
            Err(offline(peer))
        }

        async fn register_peer(&self, peer: &str, _: &str) -> crate::client::Result<()> {
            Err(offline(peer))
        }

        async fn register_peers_bulk(&self, peer: &str, _: &[String]) -> crate::client::Result<()> {
            Err(offline(peer))
        }

        async fn announce(&self, peer: &str, _: &str) -> crate::client::Result<()> {
            Err(offline(peer))
        }

        async fn fetch_snapshot(&self, peer: &str) -> crate::client::Result<ChainSnapshot> {
            Err(offline(peer))
        }
    }

    fn node() -> Node<Offline> {
        Node::new(NodeConfig::default(), Offline)
    }

    #[tokio::test]
    async fn test_fresh_node_snapshot() {
        let node = node();
        let snapshot = node.snapshot().await;

        assert_eq!(snapshot.chain.len(), 1);
        assert!(snapshot.chain[0].is_genesis());
        assert!(snapshot.pending_transactions.is_empty());
        assert!(snapshot.network_nodes.is_empty());
        assert_eq!(snapshot.current_node_url, "http://localhost:3001");
    }

    #[tokio::test]
    async fn test_create_transaction_returns_next_index() {
        let node = node();

        assert_eq!(node.create_transaction(10.0, "A", "B").await, 2);
        assert_eq!(node.snapshot().await.pending_transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_mine_clears_pool() {
        let node = node();
        node.create_transaction(10.0, "A", "B").await;
        let pool = node.snapshot().await.pending_transactions;

        let block = node.mine().await.unwrap();

        let snapshot = node.snapshot().await;
        assert_eq!(snapshot.chain.len(), 2);
        assert_eq!(block.transactions, pool);
        assert!(block.hash.starts_with("0000"));
        assert!(snapshot.pending_transactions.is_empty());
        assert!(!node.is_mining());
    }

    #[tokio::test]
    async fn test_mine_with_unreachable_peers_still_commits() {
        let node = node();
        node.register_peer("http://localhost:3002").await;

        let outcome = node.mine_and_broadcast().await.unwrap();

        assert_eq!(outcome.block.index, 2);
        assert_eq!(outcome.block_broadcast.failed.len(), 1);
        assert_eq!(outcome.reward.transaction.amount, 12.5);
        assert_eq!(outcome.reward.transaction.sender, "00");
        assert_eq!(outcome.reward.block_index, 3);

        let snapshot = node.snapshot().await;
        assert_eq!(snapshot.chain.len(), 2);
        assert_eq!(snapshot.pending_transactions, vec![outcome.reward.transaction]);
    }

    #[tokio::test]
    async fn test_concurrent_mine_rejected() {
        let node = node();
        node.is_mining.store(true, Ordering::SeqCst);

        assert!(matches!(node.mine().await, Err(NodeError::MiningInProgress)));
    }

    /// Node whose proof search can never succeed: hashes are lowercase hex.
    fn unsolvable_node() -> Arc<Node<Offline>> {
        let config = NodeConfig {
            ledger: LedgerConfig {
                difficulty_prefix: "zz".to_string(),
                ..LedgerConfig::default()
            },
            ..NodeConfig::default()
        };
        Node::shared(config, Offline)
    }

    fn start_mining(node: &Arc<Node<Offline>>) -> tokio::task::JoinHandle<Result<Block>> {
        let node = node.clone();
        tokio::spawn(async move { node.mine().await })
    }

    /// Wait until a live proof search is registered.
    async fn wait_for_search(node: &Node<Offline>) -> CancelFlag {
        loop {
            if let Some(search) = node.state.lock().await.search.clone() {
                if !search.is_cancelled() {
                    return search;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_peer_block_interrupts_mining() {
        let node = unsolvable_node();
        node.create_transaction(1.0, "A", "B").await;
        let miner = start_mining(&node);
        wait_for_search(&node).await;
        assert!(node.is_mining());

        let block = Ledger::default().mine_block().clone();
        assert!(node.receive_block(block.clone()).await);

        let result = tokio::time::timeout(Duration::from_secs(10), miner)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(NodeError::MiningInterrupted(PowError::Cancelled { .. }))
        ));
        assert!(!node.is_mining());

        let snapshot = node.snapshot().await;
        assert_eq!(snapshot.chain.len(), 2);
        assert_eq!(snapshot.chain[1], block);
        assert!(snapshot.pending_transactions.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_mine_stops_search() {
        let node = unsolvable_node();
        let miner = start_mining(&node);
        let search = wait_for_search(&node).await;

        miner.abort();
        assert!(miner.await.unwrap_err().is_cancelled());
        assert!(search.is_cancelled());
        assert!(!node.is_mining());

        // The next search starts cleanly and shutdown stops it.
        let miner = start_mining(&node);
        let search = wait_for_search(&node).await;
        node.shutdown().await;

        let result = tokio::time::timeout(Duration::from_secs(10), miner)
            .await
            .unwrap()
            .unwrap();
        assert!(search.is_cancelled());
        assert!(matches!(result, Err(NodeError::MiningInterrupted(_))));
        assert!(!node.is_mining());
        assert_eq!(node.snapshot().await.chain.len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_block_cancels_search() {
        let node = node();
        let cancel = CancelFlag::new();
        node.state.lock().await.search = Some(cancel.clone());

        let mut other = Ledger::default();
        let block = other.mine_block().clone();

        assert!(node.receive_block(block).await);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_rejected_block_leaves_state() {
        let node = node();
        node.create_transaction(1.0, "A", "B").await;
        let mut other = Ledger::default();
        let mut block = other.mine_block().clone();
        block.previous_block_hash = "elsewhere".to_string();

        assert!(!node.receive_block(block).await);

        let snapshot = node.snapshot().await;
        assert_eq!(snapshot.chain.len(), 1);
        assert_eq!(snapshot.pending_transactions.len(), 1);
    }

    #[tokio::test]
    async fn test_register_self_is_noop() {
        let node = node();

        assert!(!node.register_peer("http://localhost:3001").await);
        let outcome = node
            .register_and_broadcast_peer("http://localhost:3001")
            .await;
        assert!(!outcome.registered);
        assert_eq!(outcome.bulk_register.attempted(), 0);
        assert!(node.peers().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_and_broadcast_with_unreachable_network() {
        let node = node();
        node.register_peer("http://localhost:3002").await;

        let outcome = node
            .register_and_broadcast_peer("http://localhost:3003")
            .await;

        assert!(outcome.registered);
        assert_eq!(outcome.broadcast.failed.len(), 1);
        assert_eq!(outcome.bulk_register.failed[0].peer, "http://localhost:3003");
        assert_eq!(
            node.peers().await,
            vec!["http://localhost:3002", "http://localhost:3003"]
        );
    }

    #[tokio::test]
    async fn test_shutdown_cancels_search() {
        let node = node();
        let cancel = CancelFlag::new();
        node.state.lock().await.search = Some(cancel.clone());

        node.shutdown().await;

        assert!(cancel.is_cancelled());
    }
}
