//! peerchain node entry point.

use anyhow::{Context, Result};
use clap::Parser;
use peerchain_network::{HttpPeerClient, Node};
use peerchain_server::{bootstrap, serve, Args};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    let config = args.node_config();
    let client = HttpPeerClient::new(config.peer_timeout).context("failed to build peer client")?;
    let node = Node::shared(config, client);

    let addr = args.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(
        %addr,
        node_url = %node.node_url(),
        reward_address = %node.config().reward_address,
        "node listening"
    );

    if !args.peers.is_empty() {
        tokio::spawn(bootstrap(node.clone(), args.peers.clone()));
    }

    serve(listener, node, shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
