//! An LRU read-through/write-through wrapper over any [`Storage`] backend.
//!
//! Grounded on `oZKS/storage/memory_storage_cache.cpp`'s four-cache
//! structure (node / trie / ozks / store-element), collapsed to this
//! crate's three namespaces, and on
//! `apollo_class_manager::class_storage::CachedClassStorage<S: ClassStorage>`
//! for the generic-wrapper-over-trait shape and `#[instrument]` usage.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::instrument;

use crate::storage_trait::{Storage, StorageUpdate};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct NodeKey(u64, Vec<u8>);
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct HeaderKey(u64);
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PayloadKey(u64, Vec<u8>);

/// Per-namespace LRU capacities. Zero disables caching for that namespace.
#[derive(Clone, Copy, Debug)]
pub struct CachedStorageConfig {
    pub node_cache_size: usize,
    pub header_cache_size: usize,
    pub payload_cache_size: usize,
}

impl Default for CachedStorageConfig {
    fn default() -> Self {
        Self { node_cache_size: 10_000, header_cache_size: 16, payload_cache_size: 10_000 }
    }
}

pub struct CachedStorage<S: Storage> {
    storage: S,
    nodes: Mutex<LruCache<NodeKey, Vec<u8>>>,
    headers: Mutex<LruCache<HeaderKey, Vec<u8>>>,
    payloads: Mutex<LruCache<PayloadKey, Vec<u8>>>,
}

fn cache_of(size: usize) -> NonZeroUsize {
    NonZeroUsize::new(size.max(1)).expect("max(1) is always non-zero")
}

impl<S: Storage> CachedStorage<S> {
    pub fn new(config: CachedStorageConfig, storage: S) -> Self {
        Self {
            storage,
            nodes: Mutex::new(LruCache::new(cache_of(config.node_cache_size))),
            headers: Mutex::new(LruCache::new(cache_of(config.header_cache_size))),
            payloads: Mutex::new(LruCache::new(cache_of(config.payload_cache_size))),
        }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Storage> Storage for CachedStorage<S> {
    type Error = S::Error;

    #[instrument(skip(self), level = "debug", err)]
    fn load_node(&self, trie_id: u64, label: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        let key = NodeKey(trie_id, label.to_vec());
        if let Some(hit) = self.nodes.lock().expect("cache lock poisoned").get(&key).cloned() {
            return Ok(Some(hit));
        }
        let loaded = self.storage.load_node(trie_id, label)?;
        if let Some(data) = &loaded {
            self.nodes.lock().expect("cache lock poisoned").put(key, data.clone());
        }
        Ok(loaded)
    }

    #[instrument(skip(self, data), level = "debug", err)]
    fn save_node(&self, trie_id: u64, label: &[u8], data: &[u8]) -> Result<(), Self::Error> {
        self.storage.save_node(trie_id, label, data)?;
        self.nodes
            .lock()
            .expect("cache lock poisoned")
            .put(NodeKey(trie_id, label.to_vec()), data.to_vec());
        Ok(())
    }

    #[instrument(skip(self), level = "debug", err)]
    fn load_trie_header(&self, trie_id: u64) -> Result<Option<Vec<u8>>, Self::Error> {
        let key = HeaderKey(trie_id);
        if let Some(hit) = self.headers.lock().expect("cache lock poisoned").get(&key).cloned() {
            return Ok(Some(hit));
        }
        let loaded = self.storage.load_trie_header(trie_id)?;
        if let Some(data) = &loaded {
            self.headers.lock().expect("cache lock poisoned").put(key, data.clone());
        }
        Ok(loaded)
    }

    #[instrument(skip(self, data), level = "debug", err)]
    fn save_trie_header(&self, trie_id: u64, data: &[u8]) -> Result<(), Self::Error> {
        self.storage.save_trie_header(trie_id, data)?;
        self.headers.lock().expect("cache lock poisoned").put(HeaderKey(trie_id), data.to_vec());
        Ok(())
    }

    #[instrument(skip(self), level = "debug", err)]
    fn load_payload(&self, trie_id: u64, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        let cache_key = PayloadKey(trie_id, key.to_vec());
        if let Some(hit) =
            self.payloads.lock().expect("cache lock poisoned").get(&cache_key).cloned()
        {
            return Ok(Some(hit));
        }
        let loaded = self.storage.load_payload(trie_id, key)?;
        if let Some(data) = &loaded {
            self.payloads.lock().expect("cache lock poisoned").put(cache_key, data.clone());
        }
        Ok(loaded)
    }

    #[instrument(skip(self, data), level = "debug", err)]
    fn save_payload(&self, trie_id: u64, key: &[u8], data: &[u8]) -> Result<(), Self::Error> {
        self.storage.save_payload(trie_id, key, data)?;
        self.payloads
            .lock()
            .expect("cache lock poisoned")
            .put(PayloadKey(trie_id, key.to_vec()), data.to_vec());
        Ok(())
    }

    fn flush(&self, trie_id: u64) -> Result<(), Self::Error> {
        self.storage.flush(trie_id)
    }

    fn delete_trie(&self, trie_id: u64) -> Result<(), Self::Error> {
        self.storage.delete_trie(trie_id)?;
        // Cheaper to drop everything than to walk each LRU for one trie's
        // entries; deletion is rare enough that this is not on a hot path.
        self.nodes.lock().expect("cache lock poisoned").clear();
        self.headers.lock().expect("cache lock poisoned").clear();
        self.payloads.lock().expect("cache lock poisoned").clear();
        Ok(())
    }

    /// Delegates straight to the backing store. There is no cache fallback
    /// here: `self.headers` holds opaque, backend-serialized header bytes
    /// (this crate has no `ozks-trie` dependency and cannot parse an epoch
    /// out of them — see the module doc), whereas `trie_epoch` is a typed
    /// value each backend tracks itself (e.g. `MemoryStorage` keeps it as a
    /// plain `u64` field alongside the header blob).
    fn trie_epoch(&self, trie_id: u64) -> Result<Option<u64>, Self::Error> {
        self.storage.trie_epoch(trie_id)
    }

    fn load_updated_elements(
        &self,
        epoch: u64,
        trie_id: u64,
        sink: &mut dyn FnMut(StorageUpdate),
    ) -> Result<(), Self::Error> {
        self.storage.load_updated_elements(epoch, trie_id, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(10_000)]
    fn zero_sized_or_any_sized_cache_still_round_trips(#[case] size: usize) {
        let config = CachedStorageConfig { node_cache_size: size, header_cache_size: size, payload_cache_size: size };
        let cached = CachedStorage::new(config, MemoryStorage::new());
        cached.save_node(1, b"label", b"data").unwrap();
        assert_eq!(cached.load_node(1, b"label").unwrap(), Some(b"data".to_vec()));
    }

    #[test]
    fn cached_load_hits_cache_after_first_miss() {
        let cached = CachedStorage::new(CachedStorageConfig::default(), MemoryStorage::new());
        cached.save_node(1, b"label", b"data").unwrap();
        assert_eq!(cached.load_node(1, b"label").unwrap(), Some(b"data".to_vec()));
        // A second load must still return the right value, whether served
        // from cache or the backing store.
        assert_eq!(cached.load_node(1, b"label").unwrap(), Some(b"data".to_vec()));
    }

    #[test]
    fn cached_storage_delegates_deletes() {
        let cached = CachedStorage::new(CachedStorageConfig::default(), MemoryStorage::new());
        cached.save_node(1, b"label", b"data").unwrap();
        cached.delete_trie(1).unwrap();
        assert_eq!(cached.load_node(1, b"label").unwrap(), None);
    }
}
