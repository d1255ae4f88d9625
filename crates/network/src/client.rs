//! Outbound calls to peers.
//!
//! [`PeerClient`] is the seam between the replication logic and the wire.
//! [`HttpPeerClient`] speaks the node's JSON-over-HTTP API; tests plug in an
//! in-process implementation instead.

use crate::message::{
    BulkRegisterRequest, ChainSnapshot, NewBlockRequest, NewBlockResponse, NewNodeRequest,
};
use peerchain_core::{Block, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from a single peer call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("request to {peer} failed: {message}")]
    Transport { peer: String, message: String },

    #[error("{peer} answered with HTTP {status}")]
    Status { peer: String, status: u16 },

    #[error("request to {peer} timed out")]
    Timeout { peer: String },

    #[error("{peer} rejected the block")]
    Rejected { peer: String },

    #[error("unknown peer {0}")]
    UnknownPeer(String),

    #[error("task for {peer} failed: {message}")]
    Task { peer: String, message: String },
}

pub type Result<T> = std::result::Result<T, PeerError>;

/// Operations a node invokes on its peers.
pub trait PeerClient: Clone + Send + Sync + 'static {
    /// Hand a transaction to `peer`'s pending pool.
    fn send_transaction(
        &self,
        peer: &str,
        tx: &Transaction,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Push a freshly mined block. Resolves to the peer's accept/reject verdict.
    fn send_block(&self, peer: &str, block: &Block) -> impl Future<Output = Result<bool>> + Send;

    /// Ask `peer` to register `address`.
    fn register_peer(&self, peer: &str, address: &str) -> impl Future<Output = Result<()>> + Send;

    /// Ask `peer` to register every address in `addresses`.
    fn register_peers_bulk(
        &self,
        peer: &str,
        addresses: &[String],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Ask `peer` to register `address` and spread it to the rest of its network.
    fn announce(&self, peer: &str, address: &str) -> impl Future<Output = Result<()>> + Send;

    /// Fetch `peer`'s full state.
    fn fetch_snapshot(&self, peer: &str) -> impl Future<Output = Result<ChainSnapshot>> + Send;
}

/// [`PeerClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PeerError::Transport {
                peer: String::new(),
                message: format!("HTTP client error: {}", e),
            })?;
        Ok(Self { http })
    }

    fn url(peer: &str, path: &str) -> String {
        format!("{}/{}", peer.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, peer: &str, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(Self::url(peer, path))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(peer, e))?;
        Self::decode(peer, response).await
    }

    async fn get<R: DeserializeOwned>(&self, peer: &str, path: &str) -> Result<R> {
        let response = self
            .http
            .get(Self::url(peer, path))
            .send()
            .await
            .map_err(|e| transport_error(peer, e))?;
        Self::decode(peer, response).await
    }

    async fn decode<R: DeserializeOwned>(peer: &str, response: reqwest::Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            return Err(PeerError::Status {
                peer: peer.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().await.map_err(|e| transport_error(peer, e))
    }
}

fn transport_error(peer: &str, err: reqwest::Error) -> PeerError {
    if err.is_timeout() {
        PeerError::Timeout {
            peer: peer.to_string(),
        }
    } else {
        PeerError::Transport {
            peer: peer.to_string(),
            message: err.to_string(),
        }
    }
}

impl PeerClient for HttpPeerClient {
    async fn send_transaction(&self, peer: &str, tx: &Transaction) -> Result<()> {
        let _: serde_json::Value = self.post(peer, "transaction", tx).await?;
        Ok(())
    }

    async fn send_block(&self, peer: &str, block: &Block) -> Result<bool> {
        let body = NewBlockRequest {
            new_block: block.clone(),
        };
        let response: NewBlockResponse = self.post(peer, "receive-new-block", &body).await?;
        Ok(response.accepted)
    }

    async fn register_peer(&self, peer: &str, address: &str) -> Result<()> {
        let body = NewNodeRequest {
            new_node_url: address.to_string(),
        };
        let _: serde_json::Value = self.post(peer, "register-node", &body).await?;
        Ok(())
    }

    async fn register_peers_bulk(&self, peer: &str, addresses: &[String]) -> Result<()> {
        let body = BulkRegisterRequest {
            all_network_nodes: addresses.to_vec(),
        };
        let _: serde_json::Value = self.post(peer, "register-nodes-bulk", &body).await?;
        Ok(())
    }

    async fn announce(&self, peer: &str, address: &str) -> Result<()> {
        let body = NewNodeRequest {
            new_node_url: address.to_string(),
        };
        let _: serde_json::Value = self
            .post(peer, "register-and-broadcast-node", &body)
            .await?;
        Ok(())
    }

    async fn fetch_snapshot(&self, peer: &str) -> Result<ChainSnapshot> {
        self.get(peer, "blockchain").await
    }
}
