//! Registry of known peer addresses.

/// Known peers plus this node's own address.
///
/// The peer set never contains the node itself and never shrinks.
/// Insertion order is kept so broadcasts visit peers deterministically.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    self_address: String,
    peers: Vec<String>,
}

impl PeerRegistry {
    /// Create an empty registry for a node reachable at `self_address`.
    pub fn new(self_address: impl Into<String>) -> Self {
        Self {
            self_address: self_address.into(),
            peers: Vec::new(),
        }
    }

    /// This node's own address.
    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Add a peer. Returns `false` for duplicates and for the node itself.
    pub fn register(&mut self, address: &str) -> bool {
        if address == self.self_address || self.contains(address) {
            return false;
        }
        self.peers.push(address.to_string());
        true
    }

    /// Register each address in order. Returns how many were new.
    pub fn register_bulk<'a, I>(&mut self, addresses: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        addresses
            .into_iter()
            .filter(|address| self.register(address))
            .count()
    }

    /// Check whether `address` is a known peer.
    pub fn contains(&self, address: &str) -> bool {
        self.peers.iter().any(|peer| peer == address)
    }

    /// Snapshot of the peer set.
    pub fn list(&self) -> Vec<String> {
        self.peers.clone()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
