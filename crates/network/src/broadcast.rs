//! Concurrent fan-out to peers with per-peer outcomes.

use crate::client::PeerError;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// A peer call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerFailure {
    pub peer: String,
    pub error: String,
}

/// Outcome of one broadcast round.
///
/// A round never fails as a whole: the local change is already applied, and
/// each peer either succeeded or is listed with its error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<PeerFailure>,
}

impl BroadcastReport {
    /// Build a report from per-peer results.
    pub fn from_results<T>(results: Vec<(String, Result<T, PeerError>)>) -> Self {
        let mut report = Self::default();
        for (peer, result) in results {
            report.record(peer, result);
        }
        report
    }

    /// Record one peer's result.
    pub fn record<T>(&mut self, peer: String, result: Result<T, PeerError>) {
        match result {
            Ok(_) => self.succeeded.push(peer),
            Err(e) => {
                warn!(peer = %peer, error = %e, "peer call failed");
                self.failed.push(PeerFailure {
                    peer,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Number of peers contacted.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when every contacted peer succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `call` against every peer concurrently and wait for all of them.
///
/// Each call is a separate task bounded by `timeout`, so a slow or dead peer
/// never holds up the others. Results come back in `peers` order.
pub async fn fan_out<T, F, Fut>(
    peers: Vec<String>,
    timeout: Duration,
    mut call: F,
) -> Vec<(String, Result<T, PeerError>)>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, PeerError>> + Send + 'static,
    T: Send + 'static,
{
    debug!(peers = peers.len(), "fanning out to peers");

    let handles: Vec<_> = peers
        .into_iter()
        .map(|peer| {
            let task = tokio::spawn(tokio::time::timeout(timeout, call(peer.clone())));
            (peer, task)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (peer, task) in handles {
        let result = match task.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(PeerError::Timeout { peer: peer.clone() }),
            Err(e) => Err(PeerError::Task {
                peer: peer.clone(),
                message: e.to_string(),
            }),
        };
        results.push((peer, result));
    }
    results
}
