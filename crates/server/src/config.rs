//! Command-line configuration for a node process.

use clap::Parser;
use peerchain_chain::LedgerConfig;
use peerchain_core::random_id;
use peerchain_network::NodeConfig;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::Level;

#[derive(Debug, Clone, Parser)]
#[command(name = "peerchain-node")]
#[command(about = "A peer-replicated proof-of-work ledger node", long_about = None)]
pub struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Address peers use to reach this node. Defaults to http://localhost:<port>.
    #[arg(long)]
    pub node_url: Option<String>,

    /// Recipient of mining rewards. Defaults to a random id.
    #[arg(long)]
    pub reward_address: Option<String>,

    /// Peer to join at startup. May be repeated.
    #[arg(long = "peer")]
    pub peers: Vec<String>,

    /// Upper bound on each call to a peer, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub peer_timeout_ms: u64,

    /// Check proof of work on blocks received from peers.
    #[arg(long)]
    pub verify_incoming_proof: bool,

    /// Log level.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,
}

impl Args {
    /// Socket address to bind.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// Build the node configuration.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            node_url: self
                .node_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}", self.port)),
            reward_address: self.reward_address.clone().unwrap_or_else(random_id),
            peer_timeout: self.peer_timeout(),
            ledger: LedgerConfig {
                verify_incoming_proof: self.verify_incoming_proof,
                ..LedgerConfig::default()
            },
            ..NodeConfig::default()
        }
    }
}
