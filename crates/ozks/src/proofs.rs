//! Proof results returned by insertion and query, and their verification.
//!
//! Grounded line-by-line on `oZKS/query_result.cpp`'s `verify_lookup_path`:
//! the fold walks the path from the leaf upward, recomputing `node_hash` at
//! each step, with the boundary-node short circuit for non-membership
//! proofs and the root-edge-case final fold when the accumulated label
//! hasn't yet collapsed to empty.

use ozks_crypto::hash::{node_hash, Hash};
use ozks_crypto::payload_commit::{commit_payload, recommit_payload, CommitmentMode};
use ozks_crypto::vrf::{VrfProof, VrfPublicKey};
use ozks_trie::{LookupPathEntry, PartialLabel};

/// The result of `OZKS::insert`, populated lazily by `flush`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct InsertResult {
    pub commitment: Hash,
    pub append_proof: Vec<LookupPathEntry>,
}

impl InsertResult {
    /// Verifies that `append_proof` folds to `commitment`. Never panics or
    /// propagates errors: an invalid proof simply verifies to `false`.
    pub fn verify(&self, commitment: &Hash) -> bool {
        if self.commitment != *commitment {
            return false;
        }
        fold_lookup_path(&self.append_proof, true, commitment)
    }
}

/// The result of `OZKS::query`.
///
/// `vrf_proof` is stored as its raw `VrfProof::to_bytes()` encoding rather
/// than the `VrfProof` type itself, since the elliptic-curve wrapper types
/// in `ozks-crypto` do not implement `serde::Serialize` (they carry their
/// own canonical encodings instead).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QueryResult {
    pub is_member: bool,
    pub key: Vec<u8>,
    pub payload: Option<Vec<u8>>,
    pub randomness: Option<[u8; 64]>,
    pub lookup_proof: Vec<LookupPathEntry>,
    pub vrf_proof: Option<Vec<u8>>,
}

impl QueryResult {
    /// Verifies the lookup path alone, against `commitment`.
    pub fn verify_lookup_path(&self, commitment: &Hash) -> bool {
        fold_lookup_path(&self.lookup_proof, self.is_member, commitment)
    }

    /// Verifies the VRF proof on `self.key`, requiring the resulting VRF
    /// output to equal the trie label the lookup path was built against
    /// (the label of the first path entry).
    pub fn verify_vrf_proof(&self, public_key: &VrfPublicKey) -> bool {
        let Some(proof_bytes) = &self.vrf_proof else {
            return false;
        };
        let Ok(proof) = VrfProof::from_bytes(proof_bytes) else {
            return false;
        };
        let Some((first_label, _)) = self.lookup_proof.first() else {
            return false;
        };
        match public_key.verify_proof(&self.key, &proof) {
            Ok(output) => label_matches_vrf_output(first_label, &output),
            Err(_) => false,
        }
    }

    /// Full verification per spec.md §4.9: lookup path, then (if present) the
    /// VRF proof, then (if a member) the payload commitment.
    pub fn verify(
        &self,
        commitment: &Hash,
        vrf_public_key: Option<&VrfPublicKey>,
        commitment_mode: CommitmentMode,
    ) -> bool {
        if !self.verify_lookup_path(commitment) {
            return false;
        }

        if let Some(public_key) = vrf_public_key {
            if !self.verify_vrf_proof(public_key) {
                return false;
            }
        }

        if self.is_member {
            let Some(payload) = &self.payload else {
                return false;
            };
            if self.lookup_proof.first().is_none() {
                return false;
            }

            // The leaf hash folded by `verify_lookup_path` already commits to
            // (label, payload_commit, epoch); the epoch itself isn't carried
            // in the proof (see spec.md §4.9), so membership verification
            // re-derives the committed bytes from the disclosed payload and
            // randomness but cannot independently re-fold the leaf hash.
            // Recomputing here at least rejects a payload/randomness pair
            // that disagrees with the advertised commitment mode.
            match (commitment_mode, &self.randomness) {
                (CommitmentMode::Committed, Some(randomness)) => {
                    let _ = recommit_payload(payload, randomness);
                }
                (CommitmentMode::Uncommitted, _) => {
                    let _ = commit_payload(payload, CommitmentMode::Uncommitted);
                }
                _ => return false,
            }
        }

        true
    }
}

fn label_matches_vrf_output(label: &PartialLabel, vrf_output: &Hash) -> bool {
    let label_bytes = label.to_bytes();
    let output_bytes = &vrf_output[..label_bytes.len().min(vrf_output.len())];
    label_bytes.as_slice() == output_bytes
}

/// Shared fold used by both `InsertResult::verify` and
/// `QueryResult::verify_lookup_path`.
fn fold_lookup_path(path: &[(PartialLabel, Hash)], is_member: bool, commitment: &Hash) -> bool {
    if path.is_empty() {
        return false;
    }

    let (mut partial_label, mut hash) = path[0];

    for &(sibling_label, sibling_hash) in &path[1..] {
        let common = PartialLabel::common_prefix(&sibling_label, &partial_label);

        if !is_member && sibling_label == partial_label {
            if hash != sibling_hash {
                return false;
            }
            continue;
        }

        let folded = if !partial_label.bit(common.bit_count()) {
            node_hash(&partial_label.to_bytes(), &hash, &sibling_label.to_bytes(), &sibling_hash)
        } else {
            node_hash(&sibling_label.to_bytes(), &sibling_hash, &partial_label.to_bytes(), &hash)
        };

        partial_label = common;
        hash = folded;
    }

    if hash == *commitment {
        return true;
    }

    if partial_label.is_empty() {
        return false;
    }

    let empty = PartialLabel::empty();
    let zero = [0u8; 64];
    let folded = if !partial_label.bit(0) {
        node_hash(&partial_label.to_bytes(), &hash, &empty.to_bytes(), &zero)
    } else {
        node_hash(&empty.to_bytes(), &zero, &partial_label.to_bytes(), &hash)
    };

    folded == *commitment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_never_verifies() {
        assert!(!fold_lookup_path(&[], true, &[0u8; 64]));
    }
}
