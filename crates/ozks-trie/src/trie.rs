//! The compressed binary prefix trie.
//!
//! Grounded on `oZKS/compressed_trie.h`/`.cpp` for single insert, lookup and
//! commitment. Parallel batch insertion (partitioning the batch across
//! `2^root_levels` subtrees, one per worker thread) follows spec.md §4.3.1,
//! which intentionally goes beyond the original's synchronous,
//! single-threaded `insert(batch)` — a deliberate redesign the specification
//! calls for, built with `std::thread::scope` rather than ported from the
//! (single-threaded) original.

use std::thread;

use ozks_crypto::hash::Hash;
use rand::RngCore;

use crate::error::{TrieError, TrieResult};
use crate::node::{CTNode, LookupPathEntry};
use crate::partial_label::PartialLabel;

/// One entry to insert: a label and its already-committed payload hash.
pub type LabelHashEntry = (PartialLabel, Hash);

/// The sibling/ancestor path produced by a single insertion, handed back to
/// the caller so it can build an `InsertResult` proof.
pub type AppendProof = Vec<LookupPathEntry>;

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct CompressedTrie {
    root: CTNode,
    epoch: u64,
    id: u64,
    #[serde(skip)]
    thread_count: usize,
}

impl Default for CompressedTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressedTrie {
    pub fn new() -> Self {
        CompressedTrie { root: CTNode::new_root(), epoch: 0, id: random_trie_id(), thread_count: 0 }
    }

    pub fn with_thread_count(thread_count: usize) -> Self {
        let mut trie = Self::new();
        trie.thread_count = thread_count;
        trie
    }

    /// Builds a fresh, empty trie with a caller-chosen `id` rather than a
    /// random one. Used when reconstituting a façade whose trie identity
    /// must survive a `clear()` or a `load()`.
    pub fn with_id(id: u64, thread_count: usize) -> Self {
        let mut trie = Self::new();
        trie.id = id;
        trie.thread_count = thread_count;
        trie
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn root(&self) -> &CTNode {
        &self.root
    }

    /// The commitment: the root's 64-byte hash after all pending hashes have
    /// been recomputed. Fails if the root is still dirty, which would mean a
    /// caller is asking for a commitment mid-mutation.
    pub fn commitment(&self) -> TrieResult<Hash> {
        self.root.hash()
    }

    /// Inserts one label, returning the append proof (the path from the new
    /// leaf up to the root, as it existed immediately after insertion).
    pub fn insert(&mut self, label: &PartialLabel, payload_hash: Hash) -> TrieResult<AppendProof> {
        self.root.insert(label, payload_hash, self.epoch)?;
        self.root.recompute_hashes(0, 0);
        self.epoch += 1;

        let mut path = Vec::new();
        let found = self.root.lookup(label, &mut path, true);
        if !found {
            return Err(TrieError::InvariantViolated(
                "label not found immediately after insertion".into(),
            ));
        }
        Ok(path)
    }

    /// Inserts a batch of labels, returning one append proof per entry in
    /// the same order as `entries`. If the root's structure admits it, the
    /// batch is parallelized across `2^root_levels` subtrees (spec.md
    /// §4.3.1); `root_levels` is the largest value that still has every one
    /// of those subtrees already present in the trie (otherwise a worker
    /// would have nowhere to insert into), capped at the power-of-two floor
    /// of `min(thread_count, available_parallelism, entries.len())`.
    pub fn insert_batch(&mut self, entries: &[LabelHashEntry]) -> TrieResult<Vec<AppendProof>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let root_levels = self.parallel_root_levels(entries.len());

        if root_levels > 0 {
            self.insert_batch_parallel(entries, root_levels)?;
        } else {
            for (label, payload_hash) in entries {
                self.root.insert(label, *payload_hash, self.epoch)?;
            }
        }

        self.root.recompute_hashes(0, root_levels);
        self.epoch += 1;

        let mut proofs = Vec::with_capacity(entries.len());
        for (label, _) in entries {
            let mut path = Vec::new();
            if !self.root.lookup(label, &mut path, true) {
                return Err(TrieError::InvariantViolated(
                    "label not found immediately after batch insertion".into(),
                ));
            }
            proofs.push(path);
        }
        Ok(proofs)
    }

    /// The number of top levels a parallel batch insert should hand off to
    /// workers, one subtree per worker: the power-of-two floor of
    /// `min(thread_count, available_parallelism, batch_size)`, then reduced
    /// (by halving the worker count) until every one of the `2^root_levels`
    /// subtrees it implies actually exists in the trie yet.
    fn parallel_root_levels(&mut self, batch_size: usize) -> u32 {
        if self.thread_count <= 1 || batch_size <= 1 {
            return 0;
        }
        let available = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let worker_cap = self.thread_count.min(available).min(batch_size);
        let mut root_levels = floor_log2(worker_cap);
        while root_levels > 0 && self.root.subtrees_at_depth(root_levels).is_none() {
            root_levels -= 1;
        }
        root_levels
    }

    fn insert_batch_parallel(&mut self, entries: &[LabelHashEntry], root_levels: u32) -> TrieResult<()> {
        let epoch = self.epoch;
        let worker_count = 1usize << root_levels;

        let mut buckets: Vec<Vec<LabelHashEntry>> = vec![Vec::new(); worker_count];
        for entry in entries {
            let mut index = 0usize;
            for level in 0..root_levels {
                index = (index << 1) | usize::from(entry.0.bit(level));
            }
            buckets[index].push(entry.clone());
        }

        let subtrees = self
            .root
            .subtrees_at_depth(root_levels)
            .expect("parallel_root_levels already verified these subtrees exist");

        thread::scope(|scope| -> TrieResult<()> {
            let handles: Vec<_> = subtrees
                .into_iter()
                .zip(buckets)
                .map(|(subtree, bucket)| {
                    scope.spawn(move || -> TrieResult<()> {
                        for (label, payload_hash) in &bucket {
                            subtree.insert(label, *payload_hash, epoch)?;
                        }
                        subtree.recompute_hashes(0, 0);
                        Ok(())
                    })
                })
                .collect();

            for handle in handles {
                handle
                    .join()
                    .map_err(|_| TrieError::InvariantViolated("batch insert worker thread panicked".into()))??;
            }
            Ok(())
        })?;

        self.root.mark_dirty_to_depth(root_levels);
        Ok(())
    }

    /// Looks up `label`, returning `(found, path)`. `path` is the membership
    /// path (leaf plus siblings walking up) when `found`, otherwise the
    /// non-membership boundary path.
    pub fn lookup(&self, label: &PartialLabel) -> (bool, Vec<LookupPathEntry>) {
        let mut path = Vec::new();
        let found = self.root.lookup(label, &mut path, true);
        (found, path)
    }
}

fn random_trie_id() -> u64 {
    rand::rngs::OsRng.next_u64()
}

/// `floor(log2(n))`, treating `n == 0` the same as `n == 1` (no parallelism).
fn floor_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - 1 - n.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_from_str(bits: &str) -> PartialLabel {
        PartialLabel::from_bits(&bits.chars().map(|c| c == '1').collect::<Vec<_>>())
    }

    #[test]
    fn fresh_trie_has_zero_epoch_and_zero_commitment() {
        let trie = CompressedTrie::new();
        assert_eq!(trie.epoch(), 0);
        assert_eq!(trie.commitment().unwrap(), [0u8; 64]);
    }

    #[test]
    fn insert_increments_epoch_and_changes_commitment() {
        let mut trie = CompressedTrie::new();
        let before = trie.commitment().unwrap();
        trie.insert(&label_from_str("1010"), [9u8; 64]).unwrap();
        assert_eq!(trie.epoch(), 1);
        assert_ne!(trie.commitment().unwrap(), before);
    }

    #[test]
    fn lookup_reports_membership_after_insert() {
        let mut trie = CompressedTrie::new();
        let label = label_from_str("1100");
        trie.insert(&label, [3u8; 64]).unwrap();
        let (found, path) = trie.lookup(&label);
        assert!(found);
        assert!(!path.is_empty());
    }

    #[test]
    fn lookup_reports_non_membership_for_missing_label() {
        let mut trie = CompressedTrie::new();
        trie.insert(&label_from_str("1100"), [3u8; 64]).unwrap();
        let (found, _path) = trie.lookup(&label_from_str("0011"));
        assert!(!found);
    }

    #[test]
    fn batch_insert_matches_sequential_inserts() {
        let mut sequential = CompressedTrie::new();
        let labels = [
            label_from_str("1000"),
            label_from_str("0100"),
            label_from_str("1100"),
            label_from_str("0010"),
        ];
        for label in &labels {
            sequential.insert(label, [4u8; 64]).unwrap();
        }

        let mut batched = CompressedTrie::new();
        let entries: Vec<LabelHashEntry> = labels.iter().map(|l| (*l, [4u8; 64])).collect();
        batched.insert_batch(&entries).unwrap();

        assert_eq!(sequential.commitment().unwrap(), batched.commitment().unwrap());
    }

    #[test]
    fn duplicate_label_in_batch_errors() {
        let mut trie = CompressedTrie::new();
        let label = label_from_str("1010");
        let entries = vec![(label, [1u8; 64]), (label, [2u8; 64])];
        assert!(trie.insert_batch(&entries).is_err());
    }

    #[test]
    fn batch_insert_parallelizes_across_more_than_two_subtrees() {
        // Seeds all four 2-bit prefixes so the root has a full depth-2
        // structure, then inserts one more label under each prefix as a
        // batch with thread_count = 4 — requesting more workers than the
        // old hardcoded 2-way split ever allowed.
        let seed_labels = [
            label_from_str("0000"),
            label_from_str("0100"),
            label_from_str("1000"),
            label_from_str("1100"),
        ];
        let batch_labels = [
            label_from_str("0010"),
            label_from_str("0110"),
            label_from_str("1010"),
            label_from_str("1110"),
        ];

        let mut reference = CompressedTrie::new();
        for label in &seed_labels {
            reference.insert(label, [1u8; 64]).unwrap();
        }
        for label in &batch_labels {
            reference.insert(label, [2u8; 64]).unwrap();
        }

        let mut parallel = CompressedTrie::with_thread_count(4);
        for label in &seed_labels {
            parallel.insert(label, [1u8; 64]).unwrap();
        }
        let entries: Vec<LabelHashEntry> = batch_labels.iter().map(|l| (*l, [2u8; 64])).collect();
        parallel.insert_batch(&entries).unwrap();

        assert_eq!(reference.commitment().unwrap(), parallel.commitment().unwrap());
    }

    #[test]
    fn floor_log2_matches_expected_powers_of_two() {
        assert_eq!(floor_log2(0), 0);
        assert_eq!(floor_log2(1), 0);
        assert_eq!(floor_log2(2), 1);
        assert_eq!(floor_log2(3), 1);
        assert_eq!(floor_log2(4), 2);
        assert_eq!(floor_log2(7), 2);
        assert_eq!(floor_log2(8), 3);
    }
}
