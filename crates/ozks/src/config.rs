//! Configuration accepted by [`crate::ozks::Ozks::new`].
//!
//! Grounded on spec.md §6's configuration table and `oZKS/ozks_config.h`'s
//! `OZKSConfig`: defaults match the original (VRF labels, committed
//! payloads, in-memory storage, `thread_count = 0` meaning "pick
//! automatically").

use ozks_crypto::payload_commit::CommitmentMode;

/// How trie labels are derived from an insertion key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LabelType {
    /// Labels are VRF outputs over the key, hiding key order from anyone
    /// without the VRF public key.
    VrfLabels,
    /// Labels are a plain domain-separated hash of the key.
    HashedLabels,
}

/// Node storage strategy. Retained from the original's three `CTNode`
/// variants for configuration-surface fidelity; this port's [`CTNode`]
/// collapses all three into one owned-tree representation (see
/// `ozks-trie/src/node.rs`), so every variant here behaves identically and
/// the option only affects whether a [`crate::ozks::Ozks`] instance requires
/// a backing [`ozks_storage::Storage`] at all.
///
/// [`CTNode`]: ozks_trie::CTNode
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TrieType {
    /// Trie contents are persisted through the configured storage backend.
    Stored,
    /// Trie contents live only in memory for this process's lifetime, but a
    /// storage backend is still used for payloads.
    Linked,
    /// No storage backend is used at all; `flush`/`clear`'s persistence and
    /// payload-store responsibilities are skipped entirely.
    LinkedNoStorage,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct OzksConfig {
    pub payload_commitment: CommitmentMode,
    pub label_type: LabelType,
    pub trie_type: TrieType,
    /// Seed bytes for the VRF secret key. `None` generates a fresh key.
    pub vrf_seed: Option<Vec<u8>>,
    /// Capacity of the VRF output cache. Zero still counts misses but never
    /// returns a hit.
    pub vrf_cache_size: usize,
    /// Worker threads used by `flush` for VRF/payload-commitment work and by
    /// the trie for parallel batch insertion. `0` picks a thread count
    /// automatically from the available parallelism.
    pub thread_count: usize,
}

impl Default for OzksConfig {
    fn default() -> Self {
        OzksConfig {
            payload_commitment: CommitmentMode::Committed,
            label_type: LabelType::VrfLabels,
            trie_type: TrieType::Stored,
            vrf_seed: None,
            vrf_cache_size: 1000,
            thread_count: 0,
        }
    }
}

impl OzksConfig {
    /// Resolves `thread_count == 0` to the number of available CPUs,
    /// falling back to `1` if that cannot be determined.
    pub fn resolved_thread_count(&self) -> usize {
        if self.thread_count > 0 {
            return self.thread_count;
        }
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_ozks_config() {
        let config = OzksConfig::default();
        assert_eq!(config.payload_commitment, CommitmentMode::Committed);
        assert_eq!(config.label_type, LabelType::VrfLabels);
        assert_eq!(config.trie_type, TrieType::Stored);
        assert_eq!(config.thread_count, 0);
    }

    #[test]
    fn resolved_thread_count_is_never_zero() {
        let config = OzksConfig::default();
        assert!(config.resolved_thread_count() >= 1);
    }
}
