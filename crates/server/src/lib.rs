//! HTTP front end for a peerchain node.
//!
//! [`api::build_router`] maps every node operation to a route; [`serve`] runs
//! the router on a bound listener until the shutdown signal fires.

pub mod api;
pub mod config;

pub use api::{build_router, ApiError};
pub use config::Args;

use peerchain_network::{Node, PeerClient};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Serve `node` on `listener` until `shutdown` resolves.
///
/// On shutdown any in-flight proof-of-work search is cancelled before the
/// server drains its connections.
pub async fn serve<C, S>(
    listener: TcpListener,
    node: Arc<Node<C>>,
    shutdown: S,
) -> std::io::Result<()>
where
    C: PeerClient,
    S: Future<Output = ()> + Send + 'static,
{
    let app = build_router(node.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down");
            node.shutdown().await;
        })
        .await
}

/// Announce `node` to each seed in turn.
///
/// Failures are logged and skipped; the node keeps serving either way.
pub async fn bootstrap<C: PeerClient>(node: Arc<Node<C>>, seeds: Vec<String>) {
    for seed in seeds {
        // Failures are already logged by `join`.
        let _ = node.join(&seed).await;
    }
    let peers = node.peers().await.len();
    info!(peers, "bootstrap finished");
}
