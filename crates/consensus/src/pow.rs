//! Proof-of-Work nonce search.
//!
//! A block is mined when the digest of (previous hash, candidate payload,
//! nonce) starts with a fixed prefix. The search is a linear scan from nonce 0,
//! so it is deterministic for a given input.

use peerchain_core::{digest, meets_difficulty, DIFFICULTY_PREFIX};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// How many nonces are tried between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 256;

/// Errors that can occur during proof-of-work operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("proof-of-work search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("block hash does not match its contents (expected {expected}, got {got})")]
    HashMismatch { expected: String, got: String },

    #[error("block hash {0} does not meet the difficulty target")]
    InsufficientWork(String),
}

pub type Result<T> = std::result::Result<T, PowError>;

/// Shared flag used to stop an in-flight search.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Proof-of-work engine.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    prefix: String,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DIFFICULTY_PREFIX)
    }
}

impl ProofOfWork {
    /// Create an engine that requires hashes to start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The required hash prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Find the first nonce whose digest meets the difficulty target.
    ///
    /// Runs until a solution is found.
    pub fn solve<T: Serialize + ?Sized>(&self, previous_hash: &str, payload: &T) -> u64 {
        let mut nonce = 0u64;
        while !meets_difficulty(&digest(previous_hash, payload, nonce), &self.prefix) {
            nonce += 1;
        }
        nonce
    }

    /// Same search as [`ProofOfWork::solve`], but gives up once `cancel` is set.
    pub fn solve_cancellable<T: Serialize + ?Sized>(
        &self,
        previous_hash: &str,
        payload: &T,
        cancel: &CancelFlag,
    ) -> Result<u64> {
        let mut nonce = 0u64;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(PowError::Cancelled { attempts: nonce });
            }
            if meets_difficulty(&digest(previous_hash, payload, nonce), &self.prefix) {
                return Ok(nonce);
            }
            nonce += 1;
        }
    }

    /// Check that `hash` is the digest of the inputs and meets the target.
    pub fn verify<T: Serialize + ?Sized>(
        &self,
        previous_hash: &str,
        payload: &T,
        nonce: u64,
        hash: &str,
    ) -> Result<()> {
        let expected = digest(previous_hash, payload, nonce);
        if expected != hash {
            return Err(PowError::HashMismatch {
                expected,
                got: hash.to_string(),
            });
        }
        if !meets_difficulty(hash, &self.prefix) {
            return Err(PowError::InsufficientWork(hash.to_string()));
        }
        Ok(())
    }
}
