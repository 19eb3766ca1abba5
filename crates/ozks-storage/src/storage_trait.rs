//! The storage abstraction every oZKS backend implements.
//!
//! Grounded on `apollo_class_manager::class_storage::ClassStorage`'s
//! trait-with-associated-error shape, and on the three persisted namespaces
//! of `oZKS/storage/storage.h` (trie node, trie header, payload store). The
//! trait carries bytes, not typed trie/node structs, so this crate has no
//! dependency on `ozks-trie` — callers serialize with `bincode` before
//! calling `save_*` and deserialize what `load_*` returns.

use std::error::Error;

/// A single update observed at or after `epoch`, as returned by
/// [`Storage::load_updated_elements`]. Mirrors the original's replication
/// feed used by `ozks_distributed`-style readers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageUpdate {
    Node { label: Vec<u8>, data: Vec<u8> },
    TrieHeader { data: Vec<u8> },
    Payload { key: Vec<u8>, data: Vec<u8> },
}

pub trait Storage: Send + Sync {
    type Error: Error + Send + Sync + 'static;

    fn load_node(&self, trie_id: u64, label: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;
    fn save_node(&self, trie_id: u64, label: &[u8], data: &[u8]) -> Result<(), Self::Error>;

    fn load_trie_header(&self, trie_id: u64) -> Result<Option<Vec<u8>>, Self::Error>;
    fn save_trie_header(&self, trie_id: u64, data: &[u8]) -> Result<(), Self::Error>;

    fn load_payload(&self, trie_id: u64, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error>;
    fn save_payload(&self, trie_id: u64, key: &[u8], data: &[u8]) -> Result<(), Self::Error>;

    /// Commits any buffered writes (no-op for backends without write buffering).
    fn flush(&self, trie_id: u64) -> Result<(), Self::Error>;

    /// Removes every record associated with `trie_id`.
    fn delete_trie(&self, trie_id: u64) -> Result<(), Self::Error>;

    /// The epoch recorded in the trie header, if one has been saved.
    fn trie_epoch(&self, trie_id: u64) -> Result<Option<u64>, Self::Error>;

    /// Replication hook: streams every record touched at or after `epoch`
    /// into `sink`, so a follower can catch up without a full reload.
    fn load_updated_elements(
        &self,
        epoch: u64,
        trie_id: u64,
        sink: &mut dyn FnMut(StorageUpdate),
    ) -> Result<(), Self::Error>;
}
