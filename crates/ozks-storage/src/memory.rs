//! An in-process reference [`Storage`] backend.
//!
//! Grounded on `oZKS/storage/memory_storage.cpp`: flat maps keyed by
//! `(trie_id, label)` / `(trie_id, key)`, with an append-only update log per
//! trie so [`Storage::load_updated_elements`] can replay everything recorded
//! at or after a given epoch.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::RwLock;

use crate::storage_trait::{Storage, StorageUpdate};

#[derive(Clone)]
struct LoggedUpdate {
    epoch: u64,
    update: StorageUpdate,
}

#[derive(Default)]
struct TrieData {
    nodes: HashMap<Vec<u8>, Vec<u8>>,
    header: Option<Vec<u8>>,
    payloads: HashMap<Vec<u8>, Vec<u8>>,
    epoch: u64,
    log: Vec<LoggedUpdate>,
}

/// A thread-safe, in-memory [`Storage`] implementation. Its `Error` type is
/// [`Infallible`]: nothing in this backend can fail short of a poisoned lock,
/// which is treated as an unrecoverable bug rather than a reportable error.
#[derive(Default)]
pub struct MemoryStorage {
    tries: RwLock<HashMap<u64, TrieData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, trie_id: u64, update: StorageUpdate) {
        let mut tries = self.tries.write().expect("MemoryStorage lock poisoned");
        let entry = tries.entry(trie_id).or_default();
        let epoch = entry.epoch;
        entry.log.push(LoggedUpdate { epoch, update });
    }
}

impl Storage for MemoryStorage {
    type Error = Infallible;

    fn load_node(&self, trie_id: u64, label: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        let tries = self.tries.read().expect("MemoryStorage lock poisoned");
        Ok(tries.get(&trie_id).and_then(|t| t.nodes.get(label)).cloned())
    }

    fn save_node(&self, trie_id: u64, label: &[u8], data: &[u8]) -> Result<(), Self::Error> {
        {
            let mut tries = self.tries.write().expect("MemoryStorage lock poisoned");
            let entry = tries.entry(trie_id).or_default();
            entry.nodes.insert(label.to_vec(), data.to_vec());
        }
        self.record(
            trie_id,
            StorageUpdate::Node { label: label.to_vec(), data: data.to_vec() },
        );
        Ok(())
    }

    fn load_trie_header(&self, trie_id: u64) -> Result<Option<Vec<u8>>, Self::Error> {
        let tries = self.tries.read().expect("MemoryStorage lock poisoned");
        Ok(tries.get(&trie_id).and_then(|t| t.header.clone()))
    }

    fn save_trie_header(&self, trie_id: u64, data: &[u8]) -> Result<(), Self::Error> {
        {
            let mut tries = self.tries.write().expect("MemoryStorage lock poisoned");
            let entry = tries.entry(trie_id).or_default();
            entry.header = Some(data.to_vec());
        }
        self.record(trie_id, StorageUpdate::TrieHeader { data: data.to_vec() });
        Ok(())
    }

    fn load_payload(&self, trie_id: u64, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        let tries = self.tries.read().expect("MemoryStorage lock poisoned");
        Ok(tries.get(&trie_id).and_then(|t| t.payloads.get(key)).cloned())
    }

    fn save_payload(&self, trie_id: u64, key: &[u8], data: &[u8]) -> Result<(), Self::Error> {
        {
            let mut tries = self.tries.write().expect("MemoryStorage lock poisoned");
            let entry = tries.entry(trie_id).or_default();
            entry.payloads.insert(key.to_vec(), data.to_vec());
        }
        self.record(
            trie_id,
            StorageUpdate::Payload { key: key.to_vec(), data: data.to_vec() },
        );
        Ok(())
    }

    fn flush(&self, _trie_id: u64) -> Result<(), Self::Error> {
        Ok(())
    }

    fn delete_trie(&self, trie_id: u64) -> Result<(), Self::Error> {
        let mut tries = self.tries.write().expect("MemoryStorage lock poisoned");
        tries.remove(&trie_id);
        Ok(())
    }

    fn trie_epoch(&self, trie_id: u64) -> Result<Option<u64>, Self::Error> {
        let tries = self.tries.read().expect("MemoryStorage lock poisoned");
        Ok(tries.get(&trie_id).map(|t| t.epoch))
    }

    fn load_updated_elements(
        &self,
        epoch: u64,
        trie_id: u64,
        sink: &mut dyn FnMut(StorageUpdate),
    ) -> Result<(), Self::Error> {
        let tries = self.tries.read().expect("MemoryStorage lock poisoned");
        if let Some(data) = tries.get(&trie_id) {
            for logged in &data.log {
                if logged.epoch >= epoch {
                    sink(logged.update.clone());
                }
            }
        }
        Ok(())
    }
}
