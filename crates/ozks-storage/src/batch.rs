//! A buffering [`Storage`] wrapper that defers writes until [`flush`].
//!
//! Grounded on `oZKS/storage/memory_storage_batch_inserter.cpp`: writes
//! accumulate in per-namespace buffers and are only pushed to the backing
//! store when the caller calls `flush`, letting a batch insert commit as one
//! unit instead of one round-trip per node.
//!
//! [`flush`]: Storage::flush

use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage_trait::{Storage, StorageUpdate};

#[derive(Default)]
struct PendingWrites {
    nodes: HashMap<Vec<u8>, Vec<u8>>,
    header: Option<Vec<u8>>,
    payloads: HashMap<Vec<u8>, Vec<u8>>,
}

pub struct BatchInsertingStorage<S: Storage> {
    storage: S,
    pending: Mutex<HashMap<u64, PendingWrites>>,
}

impl<S: Storage> BatchInsertingStorage<S> {
    pub fn new(storage: S) -> Self {
        Self { storage, pending: Mutex::new(HashMap::new()) }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S: Storage> Storage for BatchInsertingStorage<S> {
    type Error = S::Error;

    fn load_node(&self, trie_id: u64, label: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        {
            let pending = self.pending.lock().expect("batch lock poisoned");
            if let Some(buffered) = pending.get(&trie_id).and_then(|p| p.nodes.get(label)) {
                return Ok(Some(buffered.clone()));
            }
        }
        self.storage.load_node(trie_id, label)
    }

    fn save_node(&self, trie_id: u64, label: &[u8], data: &[u8]) -> Result<(), Self::Error> {
        let mut pending = self.pending.lock().expect("batch lock poisoned");
        pending.entry(trie_id).or_default().nodes.insert(label.to_vec(), data.to_vec());
        Ok(())
    }

    fn load_trie_header(&self, trie_id: u64) -> Result<Option<Vec<u8>>, Self::Error> {
        {
            let pending = self.pending.lock().expect("batch lock poisoned");
            if let Some(buffered) = pending.get(&trie_id).and_then(|p| p.header.clone()) {
                return Ok(Some(buffered));
            }
        }
        self.storage.load_trie_header(trie_id)
    }

    fn save_trie_header(&self, trie_id: u64, data: &[u8]) -> Result<(), Self::Error> {
        let mut pending = self.pending.lock().expect("batch lock poisoned");
        pending.entry(trie_id).or_default().header = Some(data.to_vec());
        Ok(())
    }

    fn load_payload(&self, trie_id: u64, key: &[u8]) -> Result<Option<Vec<u8>>, Self::Error> {
        {
            let pending = self.pending.lock().expect("batch lock poisoned");
            if let Some(buffered) = pending.get(&trie_id).and_then(|p| p.payloads.get(key)) {
                return Ok(Some(buffered.clone()));
            }
        }
        self.storage.load_payload(trie_id, key)
    }

    fn save_payload(&self, trie_id: u64, key: &[u8], data: &[u8]) -> Result<(), Self::Error> {
        let mut pending = self.pending.lock().expect("batch lock poisoned");
        pending.entry(trie_id).or_default().payloads.insert(key.to_vec(), data.to_vec());
        Ok(())
    }

    fn flush(&self, trie_id: u64) -> Result<(), Self::Error> {
        let drained = {
            let mut pending = self.pending.lock().expect("batch lock poisoned");
            pending.remove(&trie_id)
        };
        let Some(drained) = drained else {
            return self.storage.flush(trie_id);
        };

        for (label, data) in drained.nodes {
            self.storage.save_node(trie_id, &label, &data)?;
        }
        if let Some(header) = drained.header {
            self.storage.save_trie_header(trie_id, &header)?;
        }
        for (key, data) in drained.payloads {
            self.storage.save_payload(trie_id, &key, &data)?;
        }

        self.storage.flush(trie_id)
    }

    fn delete_trie(&self, trie_id: u64) -> Result<(), Self::Error> {
        self.pending.lock().expect("batch lock poisoned").remove(&trie_id);
        self.storage.delete_trie(trie_id)
    }

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

    #[test]
    fn writes_are_invisible_to_backing_store_until_flush() {
        let batched = BatchInsertingStorage::new(MemoryStorage::new());
        batched.save_node(1, b"label", b"data").unwrap();

        // Visible through the batch wrapper...
        assert_eq!(batched.load_node(1, b"label").unwrap(), Some(b"data".to_vec()));
        // ...but not yet in the backing store.
        assert_eq!(batched.storage.load_node(1, b"label").unwrap(), None);

        batched.flush(1).unwrap();
        assert_eq!(batched.storage.load_node(1, b"label").unwrap(), Some(b"data".to_vec()));
    }

    #[test]
    fn flush_on_empty_batch_is_a_no_op() {
        let batched = BatchInsertingStorage::new(MemoryStorage::new());
        batched.flush(1).unwrap();
    }
}
