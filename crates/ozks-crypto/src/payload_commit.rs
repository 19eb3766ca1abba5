//! Payload commitment modes.
//!
//! Grounded on `oZKS/utilities.cpp`'s `compute_randomness_hash`: committed
//! mode hashes the payload together with 64 bytes of fresh randomness so the
//! leaf hash reveals nothing about the payload beyond what the randomness
//! itself is bound to; uncommitted mode hashes the payload directly.

use rand::RngCore;

use crate::hash::{compute_hash, randomness_hash, Hash, NONRANDOM_HASH_DOMAIN};

pub const RANDOMNESS_SIZE: usize = 64;

/// The two payload-commitment modes a trie operates under. Fixed for the
/// trie's lifetime; chosen at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CommitmentMode {
    Committed,
    Uncommitted,
}

/// The result of committing a payload: the bytes that become part of the
/// leaf hash input, and (for committed mode) the randomness that must be
/// disclosed to a verifier alongside the proof.
pub struct PayloadCommitment {
    pub committed_bytes: Hash,
    pub randomness: Option<[u8; RANDOMNESS_SIZE]>,
}

pub fn commit_payload(payload: &[u8], mode: CommitmentMode) -> PayloadCommitment {
    match mode {
        CommitmentMode::Uncommitted => PayloadCommitment {
            committed_bytes: uncommitted_hash(payload),
            randomness: None,
        },
        CommitmentMode::Committed => {
            let mut randomness = [0u8; RANDOMNESS_SIZE];
            rand::rngs::OsRng.fill_bytes(&mut randomness);
            PayloadCommitment {
                committed_bytes: randomness_hash(payload, &randomness),
                randomness: Some(randomness),
            }
        }
    }
}

/// Recomputes the committed bytes given disclosed randomness, for proof
/// verification against committed-mode leaves.
pub fn recommit_payload(payload: &[u8], randomness: &[u8; RANDOMNESS_SIZE]) -> Hash {
    randomness_hash(payload, randomness)
}

fn uncommitted_hash(payload: &[u8]) -> Hash {
    compute_hash(payload, NONRANDOM_HASH_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_mode_produces_randomness() {
        let commitment = commit_payload(b"payload", CommitmentMode::Committed);
        assert!(commitment.randomness.is_some());
    }

    #[test]
    fn committed_mode_is_recomputable_from_randomness() {
        let commitment = commit_payload(b"payload", CommitmentMode::Committed);
        let randomness = commitment.randomness.expect("committed mode has randomness");
        let recomputed = recommit_payload(b"payload", &randomness);
        assert_eq!(recomputed, commitment.committed_bytes);
    }

    #[test]
    fn uncommitted_mode_is_deterministic() {
        let a = commit_payload(b"payload", CommitmentMode::Uncommitted);
        let b = commit_payload(b"payload", CommitmentMode::Uncommitted);
        assert_eq!(a.committed_bytes, b.committed_bytes);
        assert!(a.randomness.is_none());
    }
}
