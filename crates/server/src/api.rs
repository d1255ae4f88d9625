//! HTTP API over a [`Node`].
//!
//! Handlers are thin: decode the body, call one node operation, encode the
//! result. The same routes serve clients and peers.

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use peerchain_core::{Block, Transaction};
use peerchain_network::{
    BulkRegisterRequest, ChainSnapshot, ConsensusOutcome, MineOutcome, NewBlockRequest,
    NewBlockResponse, NewNodeRequest, NewTransactionRequest, Node, NodeError, PeerClient,
    RegistrationOutcome, TransactionBroadcast,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

// ============================================================================
// Errors
// ============================================================================

/// Errors returned to API callers as `{ "error": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<NodeError> for ApiError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Task(_) => ApiError::Internal(err.to_string()),
            NodeError::MiningInProgress
            | NodeError::MiningInterrupted(_)
            | NodeError::Ledger(_) => ApiError::Conflict(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAccepted {
    pub note: String,
    pub block_index: u64,
}

impl TransactionAccepted {
    fn new(block_index: u64) -> Self {
        Self {
            note: format!("Transaction will be added in block {}.", block_index),
            block_index,
        }
    }
}

/// A node outcome with a human-readable note in front.
#[derive(Debug, Serialize)]
pub struct Noted<T> {
    pub note: &'static str,
    #[serde(flatten)]
    pub outcome: T,
}

#[derive(Debug, Serialize)]
pub struct NodeRegistered {
    pub note: &'static str,
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct NodesRegistered {
    pub note: &'static str,
    pub added: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub current_node_url: String,
    pub is_mining: bool,
}

// ============================================================================
// Router
// ============================================================================

/// Build the router for `node`.
pub fn build_router<C: PeerClient>(node: Arc<Node<C>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/blockchain", get(blockchain::<C>))
        // Transactions
        .route("/transaction", post(receive_transaction::<C>))
        .route("/transaction/create", post(create_transaction::<C>))
        .route("/transaction/broadcast", post(broadcast_transaction::<C>))
        // Blocks
        .route("/mine", get(mine::<C>).post(mine::<C>))
        .route("/receive-new-block", post(receive_new_block::<C>))
        // Peers
        .route(
            "/register-and-broadcast-node",
            post(register_and_broadcast_node::<C>),
        )
        .route("/register-node", post(register_node::<C>))
        .route("/register-nodes-bulk", post(register_nodes_bulk::<C>))
        .route("/consensus", get(consensus::<C>))
        // Explorer
        .route("/block/:hash", get(block_by_hash::<C>))
        .route("/transaction/:id", get(transaction_by_id::<C>))
        .route("/address/:address", get(address::<C>))
        .route("/health", get(health::<C>))
        .with_state(node)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

// ============================================================================
// Handlers
// ============================================================================

async fn blockchain<C: PeerClient>(State(node): State<Arc<Node<C>>>) -> Json<ChainSnapshot> {
    Json(node.snapshot().await)
}

async fn receive_transaction<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(tx): Json<Transaction>,
) -> Json<TransactionAccepted> {
    Json(TransactionAccepted::new(node.receive_transaction(tx).await))
}

async fn create_transaction<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(req): Json<NewTransactionRequest>,
) -> Json<TransactionAccepted> {
    let block_index = node
        .create_transaction(req.amount, &req.sender, &req.recipient)
        .await;
    Json(TransactionAccepted::new(block_index))
}

async fn broadcast_transaction<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(req): Json<NewTransactionRequest>,
) -> Json<Noted<TransactionBroadcast>> {
    let outcome = node
        .create_and_broadcast_transaction(req.amount, &req.sender, &req.recipient)
        .await;
    Json(Noted {
        note: "Transaction created and broadcast successfully.",
        outcome,
    })
}

async fn mine<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
) -> Result<Json<Noted<MineOutcome>>, ApiError> {
    let outcome = node.mine_and_broadcast().await?;
    Ok(Json(Noted {
        note: "New block mined and broadcast successfully.",
        outcome,
    }))
}

async fn receive_new_block<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(req): Json<NewBlockRequest>,
) -> Json<NewBlockResponse> {
    let accepted = node.receive_block(req.new_block).await;
    let note = if accepted {
        "New block received and accepted."
    } else {
        "New block rejected."
    };
    Json(NewBlockResponse {
        note: note.to_string(),
        accepted,
    })
}

async fn register_and_broadcast_node<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(req): Json<NewNodeRequest>,
) -> Json<Noted<RegistrationOutcome>> {
    let outcome = node.register_and_broadcast_peer(&req.new_node_url).await;
    Json(Noted {
        note: "New node registered with network successfully.",
        outcome,
    })
}

async fn register_node<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(req): Json<NewNodeRequest>,
) -> Json<NodeRegistered> {
    Json(NodeRegistered {
        note: "New node registered successfully.",
        registered: node.register_peer(&req.new_node_url).await,
    })
}

async fn register_nodes_bulk<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Json(req): Json<BulkRegisterRequest>,
) -> Json<NodesRegistered> {
    Json(NodesRegistered {
        note: "Bulk registration successful.",
        added: node.register_peers_bulk(&req.all_network_nodes).await,
    })
}

async fn consensus<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
) -> Json<Noted<ConsensusOutcome>> {
    let outcome = node.resolve_conflicts().await;
    let note = if outcome.replaced {
        "This chain has been replaced."
    } else {
        "Current chain has not been replaced."
    };
    Json(Noted { note, outcome })
}

#[derive(Serialize)]
struct BlockFound {
    block: Block,
}

async fn block_by_hash<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Path(hash): Path<String>,
) -> Result<Json<BlockFound>, ApiError> {
    node.block(&hash)
        .await
        .map(|block| Json(BlockFound { block }))
        .ok_or_else(|| ApiError::NotFound(format!("Block {} not found", hash)))
}

async fn transaction_by_id<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    node.transaction(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", id)))
}

async fn address<C: PeerClient>(
    State(node): State<Arc<Node<C>>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    Json(node.address(&address).await)
}

async fn health<C: PeerClient>(State(node): State<Arc<Node<C>>>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        current_node_url: node.node_url().to_string(),
        is_mining: node.is_mining(),
    })
}
