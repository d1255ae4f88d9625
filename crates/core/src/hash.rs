//! Blake3 hashing utilities for the ledger.

use serde::Serialize;

/// Hash recorded on the genesis block and used as its parent link.
pub const GENESIS_HASH: &str = "0";

/// Leading characters a block hash needs to count as mined.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Hash a block candidate.
///
/// The input is the previous hash, the decimal nonce and the JSON encoding of
/// `payload`, concatenated in that order. Struct fields serialize in
/// declaration order, so every node computing the same logical candidate gets
/// the same digest.
pub fn digest<T: Serialize + ?Sized>(previous_hash: &str, payload: &T, nonce: u64) -> String {
    let encoded = serde_json::to_string(payload).expect("serialization should not fail");

    let mut hasher = blake3::Hasher::new();
    hasher.update(previous_hash.as_bytes());
    hasher.update(nonce.to_string().as_bytes());
    hasher.update(encoded.as_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Check whether `hash` satisfies the difficulty predicate for `prefix`.
pub fn meets_difficulty(hash: &str, prefix: &str) -> bool {
    hash.starts_with(prefix)
}

/// Generate a fresh opaque identifier (128 random bits, lowercase hex).
pub fn random_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_deterministic() {
        let payload = json!({ "transactions": [], "index": 2 });
        let h1 = digest("abc", &payload, 7);
        let h2 = digest("abc", &payload, 7);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_digest_is_hex() {
        let h = digest("0", &json!([]), 0);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_depends_on_every_input() {
        let payload = json!({ "index": 2 });
        let base = digest("prev", &payload, 1);

        assert_ne!(base, digest("other", &payload, 1));
        assert_ne!(base, digest("prev", &payload, 2));
        assert_ne!(base, digest("prev", &json!({ "index": 3 }), 1));
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("0000abcd", DIFFICULTY_PREFIX));
        assert!(!meets_difficulty("000abcde", DIFFICULTY_PREFIX));
        assert!(!meets_difficulty("", DIFFICULTY_PREFIX));
    }

    #[test]
    fn test_random_id_unique() {
        let a = random_id();
        let b = random_id();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
