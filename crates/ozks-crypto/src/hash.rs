//! Domain-separated hashing used throughout the trie and the façade.
//!
//! `compute_hash` prepends the domain string's raw bytes to the input before
//! hashing; it is not a keyed hash (HMAC). This matches the original
//! `oZKS::utils::compute_hash`, which calls `crypto_sha512(domain ‖ input)`.

use sha2::{Digest, Sha512};

/// A 64-byte digest, matching the original's `hash_type` (SHA-512 output).
pub type Hash = [u8; 64];

pub const LEAF_HASH_DOMAIN: &str = "leaf_hash";
pub const NODE_HASH_DOMAIN: &str = "node_hash";
pub const RANDOMNESS_HASH_DOMAIN: &str = "randomness_hash";
pub const NONRANDOM_HASH_DOMAIN: &str = "nonrandom_hash";

/// `SHA512(domain_str ‖ input)`.
pub fn compute_hash(input: &[u8], domain_str: &str) -> Hash {
    let mut hasher = Sha512::new();
    hasher.update(domain_str.as_bytes());
    hasher.update(input);
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// Hash of a trie leaf: `label ‖ payload ‖ epoch` under the `leaf_hash` domain.
pub fn leaf_hash(label_bytes: &[u8], payload: &[u8], epoch: u64) -> Hash {
    let mut buffer = Vec::with_capacity(label_bytes.len() + payload.len() + 8);
    buffer.extend_from_slice(label_bytes);
    buffer.extend_from_slice(payload);
    buffer.extend_from_slice(&epoch.to_le_bytes());
    compute_hash(&buffer, LEAF_HASH_DOMAIN)
}

/// Hash of an interior node: `left_label ‖ left_hash ‖ right_label ‖ right_hash`
/// under the `node_hash` domain. Either side may be empty (root edge case).
pub fn node_hash(
    left_label_bytes: &[u8],
    left_hash: &[u8],
    right_label_bytes: &[u8],
    right_hash: &[u8],
) -> Hash {
    let mut buffer = Vec::with_capacity(
        left_label_bytes.len() + left_hash.len() + right_label_bytes.len() + right_hash.len(),
    );
    buffer.extend_from_slice(left_label_bytes);
    buffer.extend_from_slice(left_hash);
    buffer.extend_from_slice(right_label_bytes);
    buffer.extend_from_slice(right_hash);
    compute_hash(&buffer, NODE_HASH_DOMAIN)
}

/// Hash of `randomness ‖ buffer` under the `randomness_hash` domain, used by
/// committed payload mode.
pub fn randomness_hash(buffer: &[u8], randomness: &[u8; 64]) -> Hash {
    let mut hash_buffer = Vec::with_capacity(buffer.len() + randomness.len());
    hash_buffer.extend_from_slice(buffer);
    hash_buffer.extend_from_slice(randomness);
    compute_hash(&hash_buffer, RANDOMNESS_HASH_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(LEAF_HASH_DOMAIN, NODE_HASH_DOMAIN)]
    #[case(LEAF_HASH_DOMAIN, RANDOMNESS_HASH_DOMAIN)]
    #[case(NODE_HASH_DOMAIN, RANDOMNESS_HASH_DOMAIN)]
    fn compute_hash_is_domain_separated(#[case] domain_a: &str, #[case] domain_b: &str) {
        let a = compute_hash(b"same input", domain_a);
        let b = compute_hash(b"same input", domain_b);
        assert_ne!(a, b);
    }

    #[test]
    fn compute_hash_is_deterministic() {
        let a = compute_hash(b"hello", LEAF_HASH_DOMAIN);
        let b = compute_hash(b"hello", LEAF_HASH_DOMAIN);
        assert_eq!(a, b);
    }

    #[test]
    fn node_hash_distinguishes_side() {
        let left = node_hash(b"\x00", &[1u8; 64], b"\x01", &[2u8; 64]);
        let right = node_hash(b"\x01", &[2u8; 64], b"\x00", &[1u8; 64]);
        assert_ne!(left, right);
    }
}
