//! The oZKS façade: ties the trie, storage and VRF layers together behind
//! the public `insert` / `flush` / `query` / `get_commitment` / `save` /
//! `load` / `clear` surface (spec.md §6).
//!
//! Grounded on `oZKS/ozks.h`/`.cpp` for the overall contract, and on
//! `apollo_batcher`'s worker-pool-over-contiguous-ranges pattern for
//! `flush`'s parallel VRF/payload-commitment step.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;

use ozks_crypto::hash::{compute_hash, Hash};
use ozks_crypto::payload_commit::commit_payload;
use ozks_crypto::vrf::{VrfProof, VrfPublicKey, VrfSecretKey};
use ozks_storage::Storage;
use ozks_trie::{CompressedTrie, LabelHashEntry, PartialLabel};
use tracing::instrument;

use crate::config::{LabelType, OzksConfig, TrieType};
use crate::error::{OzksError, OzksResult};
use crate::proofs::{InsertResult, QueryResult};
use crate::vrf_cache::VrfCache;

const HASHED_LABEL_DOMAIN: &str = "hashed_label";
const VRF_SEED_DOMAIN: &str = "vrf_seed";
const SERIALIZATION_VERSION: u32 = 1;

/// A snapshot of the current commitment: the root hash, plus the VRF public
/// key when `label_type == VrfLabels` (needed by a verifier to check VRF
/// proofs in a [`QueryResult`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitment {
    pub vrf_public_key: Option<VrfPublicKey>,
    pub root_hash: Hash,
}

/// A handle to an enqueued insertion. Empty until the next [`Ozks::flush`]
/// completes, at which point it holds the insertion's proof.
#[derive(Clone)]
pub struct PendingInsertResult(Arc<Mutex<Option<InsertResult>>>);

impl PendingInsertResult {
    pub fn get(&self) -> Option<InsertResult> {
        self.0.lock().expect("pending result lock poisoned").clone()
    }
}

struct PendingEntry {
    key: Vec<u8>,
    payload: Vec<u8>,
    slot: Arc<Mutex<Option<InsertResult>>>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PersistedState {
    serialization_version: u32,
    config: OzksConfig,
    vrf_secret_key: Option<Vec<u8>>,
    trie_id: u64,
}

/// The oZKS authenticated dictionary: an append-only compressed trie behind
/// VRF-blinded labels and committed payloads, backed by a pluggable
/// [`Storage`] implementation.
pub struct Ozks<S: Storage> {
    config: OzksConfig,
    storage: Option<S>,
    trie: Mutex<CompressedTrie>,
    vrf_secret_key: Option<VrfSecretKey>,
    vrf_cache: VrfCache,
    pending: Mutex<Vec<PendingEntry>>,
}

impl<S: Storage> Ozks<S> {
    pub fn new(config: OzksConfig, storage: Option<S>) -> OzksResult<Self> {
        if config.trie_type != TrieType::LinkedNoStorage && storage.is_none() {
            return Err(OzksError::InvariantViolated(
                "trie_type requires a storage backend but none was provided".into(),
            ));
        }

        let vrf_secret_key = match config.label_type {
            LabelType::VrfLabels => Some(match &config.vrf_seed {
                Some(seed) => derive_vrf_secret_key(seed),
                None => VrfSecretKey::generate(),
            }),
            LabelType::HashedLabels => None,
        };

        let thread_count = config.resolved_thread_count();
        Ok(Ozks {
            vrf_cache: VrfCache::new(config.vrf_cache_size),
            trie: Mutex::new(CompressedTrie::with_thread_count(thread_count)),
            config,
            storage,
            vrf_secret_key,
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Enqueues one key/payload pair. The returned handle is empty until the
    /// next successful [`Ozks::flush`]. Duplicate keys are not rejected
    /// here; duplication is only detected when the pending batch reaches the
    /// trie, at `flush` time.
    pub fn insert(&self, key: Vec<u8>, payload: Vec<u8>) -> PendingInsertResult {
        let slot = Arc::new(Mutex::new(None));
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .push(PendingEntry { key, payload, slot: Arc::clone(&slot) });
        PendingInsertResult(slot)
    }

    /// Enqueues a batch of key/payload pairs, returning one handle per pair
    /// in the same order.
    pub fn insert_batch(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Vec<PendingInsertResult> {
        entries.into_iter().map(|(key, payload)| self.insert(key, payload)).collect()
    }

    /// Computes labels and payload commitments for every pending insertion
    /// (parallelized across `thread_count` workers, each claiming a
    /// contiguous range of the pending batch), writes payloads to storage
    /// under a single serializing lock, then inserts the whole batch into
    /// the trie and populates each pending handle's result.
    #[instrument(skip(self), level = "debug", err)]
    pub fn flush(&self) -> OzksResult<()> {
        let pending = {
            let mut guard = self.pending.lock().expect("pending lock poisoned");
            std::mem::take(&mut *guard)
        };
        if pending.is_empty() {
            return Ok(());
        }

        let worker_count = self.config.resolved_thread_count().clamp(1, pending.len());
        let chunk_size = pending.len().div_ceil(worker_count);
        let payload_write_lock = Mutex::new(());
        let computed: Mutex<Vec<Option<LabelHashEntry>>> =
            Mutex::new((0..pending.len()).map(|_| None).collect());

        let chunk_results: Vec<OzksResult<()>> = thread::scope(|scope| {
            let handles: Vec<_> = pending
                .chunks(chunk_size)
                .enumerate()
                .map(|(chunk_idx, chunk)| {
                    let start = chunk_idx * chunk_size;
                    let computed = &computed;
                    let payload_write_lock = &payload_write_lock;
                    scope.spawn(move || -> OzksResult<()> {
                        for (offset, entry) in chunk.iter().enumerate() {
                            let idx = start + offset;
                            let (label, _vrf_proof) = self.compute_label(&entry.key)?;
                            let commitment = commit_payload(&entry.payload, self.config.payload_commitment);

                            if self.config.trie_type != TrieType::LinkedNoStorage {
                                if let Some(storage) = &self.storage {
                                    let record = PayloadRecord {
                                        payload: entry.payload.clone(),
                                        randomness: commitment.randomness,
                                    };
                                    let bytes = bincode::serialize(&record)
                                        .map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
                                    let _guard =
                                        payload_write_lock.lock().expect("payload write lock poisoned");
                                    // spec.md §4.8: "verify absence from payload store; save
                                    // (payload, randomness) to store" — a label already present
                                    // means this key was committed by a prior flush, so the
                                    // batch must be rejected before anything is overwritten.
                                    let label_bytes = label.to_bytes();
                                    let already_present = storage
                                        .load_payload(self.trie_id(), &label_bytes)
                                        .map_err(OzksError::storage)?
                                        .is_some();
                                    if already_present {
                                        tracing::debug!(?label, "duplicate key rejected during flush");
                                        return Err(OzksError::DuplicateKey);
                                    }
                                    storage
                                        .save_payload(self.trie_id(), &label_bytes, &bytes)
                                        .map_err(OzksError::storage)?;
                                }
                            }

                            computed.lock().expect("computed lock poisoned")[idx] =
                                Some((label, commitment.committed_bytes));
                        }
                        Ok(())
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(OzksError::InvariantViolated("flush worker thread panicked".into())))
                })
                .collect()
        });

        for result in chunk_results {
            if let Err(err) = result {
                tracing::warn!(%err, "flush rolled back: batch discarded, trie and payload store left untouched");
                return Err(err);
            }
        }

        let entries: Vec<LabelHashEntry> = computed
            .into_inner()
            .expect("computed mutex poisoned")
            .into_iter()
            .map(|entry| entry.expect("every pending entry is computed by some worker"))
            .collect();

        let proofs = {
            let mut trie = self.trie.lock().expect("trie lock poisoned");
            trie.insert_batch(&entries)?
        };

        let commitment = self.commitment_snapshot()?;
        for (entry, proof) in pending.into_iter().zip(proofs) {
            let result = InsertResult { commitment, append_proof: proof };
            *entry.slot.lock().expect("pending result lock poisoned") = Some(result);
        }

        self.persist_trie()?;
        Ok(())
    }

    /// Looks up `key`, including a VRF proof when `label_type == VrfLabels`
    /// and the payload/randomness when the key is a member.
    #[instrument(skip(self), level = "debug", err)]
    pub fn query(&self, key: &[u8]) -> OzksResult<QueryResult> {
        let (label, vrf_proof) = self.compute_label(key)?;

        let (is_member, lookup_proof) = {
            let trie = self.trie.lock().expect("trie lock poisoned");
            trie.lookup(&label)
        };

        let (payload, randomness) = if is_member {
            self.load_payload(&label)?
        } else {
            (None, None)
        };

        Ok(QueryResult {
            is_member,
            key: key.to_vec(),
            payload,
            randomness,
            lookup_proof,
            vrf_proof: vrf_proof.map(|proof| proof.to_bytes().to_vec()),
        })
    }

    /// The current commitment: the trie's root hash, plus the VRF public
    /// key if this instance uses VRF labels. Fails if the trie's root is
    /// still dirty, which should not happen outside a bug: every mutating
    /// call recomputes hashes before returning.
    pub fn get_commitment(&self) -> OzksResult<Commitment> {
        Ok(Commitment {
            vrf_public_key: self.vrf_secret_key.as_ref().map(VrfSecretKey::public_key),
            root_hash: self.commitment_snapshot()?,
        })
    }

    /// Deletes this trie's contents from storage and resets it to empty,
    /// preserving the VRF secret key and the trie's identity (`id`).
    pub fn clear(&self) -> OzksResult<()> {
        let mut trie = self.trie.lock().expect("trie lock poisoned");
        let id = trie.id();
        let thread_count = self.config.resolved_thread_count();

        if self.config.trie_type != TrieType::LinkedNoStorage {
            if let Some(storage) = &self.storage {
                storage.delete_trie(id).map_err(OzksError::storage)?;
            }
        }

        *trie = CompressedTrie::with_id(id, thread_count);
        self.pending.lock().expect("pending lock poisoned").clear();
        self.vrf_cache.clear_contents();
        Ok(())
    }

    /// Persists the configuration, the VRF secret key (if any) and the
    /// trie's id as a length-prefixed, version-tagged record.
    pub fn save<W: Write>(&self, mut writer: W) -> OzksResult<usize> {
        let trie_id = self.trie.lock().expect("trie lock poisoned").id();
        let persisted = PersistedState {
            serialization_version: SERIALIZATION_VERSION,
            config: self.config.clone(),
            vrf_secret_key: self.vrf_secret_key.map(|key| key.to_bytes().to_vec()),
            trie_id,
        };
        let bytes = bincode::serialize(&persisted).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        writer.write_all(&(bytes.len() as u64).to_le_bytes()).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        writer.write_all(&bytes).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        Ok(8 + bytes.len())
    }

    /// Reconstructs an instance from what [`Ozks::save`] wrote, reloading
    /// the trie's contents from `storage` if one is supplied and the
    /// configuration calls for persisted trie contents.
    pub fn load<R: Read>(storage: Option<S>, mut reader: R) -> OzksResult<(Self, usize)> {
        let mut len_bytes = [0u8; 8];
        reader.read_exact(&mut len_bytes).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        let persisted: PersistedState =
            bincode::deserialize(&buf).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;

        if persisted.serialization_version != SERIALIZATION_VERSION {
            return Err(OzksError::InvalidEncoding(format!(
                "unsupported serialization version {}",
                persisted.serialization_version
            )));
        }

        let vrf_secret_key = persisted
            .vrf_secret_key
            .as_deref()
            .map(VrfSecretKey::from_bytes)
            .transpose()
            .map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;

        let thread_count = persisted.config.resolved_thread_count();
        let mut trie = CompressedTrie::with_id(persisted.trie_id, thread_count);

        if persisted.config.trie_type == TrieType::Stored {
            if let Some(storage) = &storage {
                if let Some(header) = storage.load_trie_header(persisted.trie_id).map_err(OzksError::storage)? {
                    trie = bincode::deserialize(&header).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
                    trie = CompressedTrie::with_id(trie.id(), thread_count);
                }
            }
        }

        let ozks = Ozks {
            vrf_cache: VrfCache::new(persisted.config.vrf_cache_size),
            trie: Mutex::new(trie),
            config: persisted.config,
            storage,
            vrf_secret_key,
            pending: Mutex::new(Vec::new()),
        };
        Ok((ozks, 8 + len))
    }

    fn trie_id(&self) -> u64 {
        self.trie.lock().expect("trie lock poisoned").id()
    }

    fn commitment_snapshot(&self) -> OzksResult<Hash> {
        Ok(self.trie.lock().expect("trie lock poisoned").commitment()?)
    }

    fn compute_label(&self, key: &[u8]) -> OzksResult<(PartialLabel, Option<VrfProof>)> {
        match self.config.label_type {
            LabelType::HashedLabels => {
                let hash = compute_hash(key, HASHED_LABEL_DOMAIN);
                Ok((PartialLabel::from_bytes(&hash, None), None))
            }
            LabelType::VrfLabels => {
                let secret_key = self.vrf_secret_key.as_ref().ok_or_else(|| {
                    OzksError::InvariantViolated("VrfLabels requires a VRF secret key".into())
                })?;

                if let Some((proof, output)) = self.vrf_cache.get(key) {
                    return Ok((PartialLabel::from_bytes(&output, None), Some(proof)));
                }

                let (proof, output) = secret_key.prove(key).map_err(|e| {
                    OzksError::InvariantViolated(format!("VRF proof generation failed: {e}"))
                })?;
                self.vrf_cache.put(key, proof, output);
                Ok((PartialLabel::from_bytes(&output, None), Some(proof)))
            }
        }
    }

    fn load_payload(&self, label: &PartialLabel) -> OzksResult<(Option<Vec<u8>>, Option<[u8; 64]>)> {
        if self.config.trie_type == TrieType::LinkedNoStorage {
            return Ok((None, None));
        }
        let Some(storage) = &self.storage else {
            return Ok((None, None));
        };
        let Some(bytes) = storage
            .load_payload(self.trie_id(), &label.to_bytes())
            .map_err(OzksError::storage)?
        else {
            return Ok((None, None));
        };
        let record: PayloadRecord =
            bincode::deserialize(&bytes).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        Ok((Some(record.payload), record.randomness))
    }

    fn persist_trie(&self) -> OzksResult<()> {
        // Only `Stored` persists the whole trie; `Linked` keeps it in-memory
        // (storage is still used for payloads) and `LinkedNoStorage` uses no
        // storage at all.
        if self.config.trie_type != TrieType::Stored {
            return Ok(());
        }
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let trie = self.trie.lock().expect("trie lock poisoned");
        let bytes = bincode::serialize(&*trie).map_err(|e| OzksError::InvalidEncoding(e.to_string()))?;
        storage.save_trie_header(trie.id(), &bytes).map_err(OzksError::storage)?;
        storage.flush(trie.id()).map_err(OzksError::storage)
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct PayloadRecord {
    payload: Vec<u8>,
    randomness: Option<[u8; 64]>,
}

fn derive_vrf_secret_key(seed: &[u8]) -> VrfSecretKey {
    let hash = compute_hash(seed, VRF_SEED_DOMAIN);
    VrfSecretKey::from_bytes(&hash[..32]).expect("compute_hash always yields 32 usable bytes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ozks_storage::MemoryStorage;
    use rand::RngCore;
    use rstest::rstest;

    fn hashed_config() -> OzksConfig {
        OzksConfig { label_type: LabelType::HashedLabels, thread_count: 1, ..OzksConfig::default() }
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(8)]
    fn flush_worker_count_does_not_affect_the_resulting_commitment(#[case] thread_count: usize) {
        let config = OzksConfig { label_type: LabelType::HashedLabels, thread_count, ..OzksConfig::default() };
        let ozks = Ozks::new(config, Some(MemoryStorage::new())).unwrap();
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..16)
            .map(|i| (format!("key-{i}").into_bytes(), format!("payload-{i}").into_bytes()))
            .collect();
        let handles = ozks.insert_batch(entries.clone());
        ozks.flush().unwrap();

        for (handle, (key, payload)) in handles.iter().zip(&entries) {
            let result = handle.get().expect("flush should have populated every handle");
            assert!(result.verify(&ozks.get_commitment().unwrap().root_hash));
            let query = ozks.query(key).unwrap();
            assert_eq!(query.payload.as_deref(), Some(payload.as_slice()));
        }
    }

    #[test]
    fn randomly_generated_keys_and_payloads_round_trip() {
        let mut rng = rand::thread_rng();
        let ozks = Ozks::new(hashed_config(), Some(MemoryStorage::new())).unwrap();

        let mut entries = Vec::new();
        for _ in 0..8 {
            let mut key = [0u8; 16];
            let mut payload = [0u8; 32];
            rng.fill_bytes(&mut key);
            rng.fill_bytes(&mut payload);
            entries.push((key.to_vec(), payload.to_vec()));
        }

        for (key, payload) in &entries {
            ozks.insert(key.clone(), payload.clone());
        }
        ozks.flush().unwrap();

        for (key, payload) in &entries {
            let query = ozks.query(key).unwrap();
            assert!(query.is_member);
            assert_eq!(query.payload.as_deref(), Some(payload.as_slice()));
        }
    }

    #[test]
    fn insert_then_flush_then_query_round_trips() {
        let _ = tracing_subscriber::fmt::try_init();
        let ozks = Ozks::new(hashed_config(), Some(MemoryStorage::new())).unwrap();
        let pending = ozks.insert(b"alice".to_vec(), b"payload-a".to_vec());
        ozks.flush().unwrap();

        let result = pending.get().expect("flush should have populated the pending result");
        assert!(result.verify(&ozks.get_commitment().unwrap().root_hash));

        let query = ozks.query(b"alice").unwrap();
        assert!(query.is_member);
        assert_eq!(query.payload.as_deref(), Some(b"payload-a".as_slice()));
    }

    #[test]
    fn query_for_missing_key_is_non_member() {
        let ozks = Ozks::new(hashed_config(), Some(MemoryStorage::new())).unwrap();
        ozks.insert(b"alice".to_vec(), b"payload-a".to_vec());
        ozks.flush().unwrap();

        let query = ozks.query(b"bob").unwrap();
        assert!(!query.is_member);
        assert!(query.payload.is_none());
    }

    #[test]
    fn clear_preserves_trie_id_but_empties_contents() {
        let ozks = Ozks::new(hashed_config(), Some(MemoryStorage::new())).unwrap();
        ozks.insert(b"alice".to_vec(), b"payload-a".to_vec());
        ozks.flush().unwrap();
        let id_before = ozks.trie_id();

        ozks.clear().unwrap();
        assert_eq!(ozks.trie_id(), id_before);

        let query = ozks.query(b"alice").unwrap();
        assert!(!query.is_member);
    }

    #[test]
    fn duplicate_key_is_rejected_at_flush() {
        let ozks = Ozks::new(hashed_config(), Some(MemoryStorage::new())).unwrap();
        ozks.insert(b"alice".to_vec(), b"payload-a".to_vec());
        ozks.flush().unwrap();
        let commitment_before = ozks.get_commitment().unwrap().root_hash;

        ozks.insert(b"alice".to_vec(), b"payload-b".to_vec());
        assert!(ozks.flush().is_err());

        // A rejected flush must leave the trie, and the payload store, exactly
        // as they were: the caller must never observe the rejected batch.
        assert_eq!(ozks.get_commitment().unwrap().root_hash, commitment_before);
        let query = ozks.query(b"alice").unwrap();
        assert_eq!(query.payload.as_deref(), Some(b"payload-a".as_slice()));
    }

    #[test]
    fn save_then_load_round_trips_configuration_and_trie_id() {
        let ozks = Ozks::new(hashed_config(), Some(MemoryStorage::new())).unwrap();
        ozks.insert(b"alice".to_vec(), b"payload-a".to_vec());
        ozks.flush().unwrap();

        let mut buf = Vec::new();
        ozks.save(&mut buf).unwrap();

        let (reloaded, bytes_read) = Ozks::load(Some(MemoryStorage::new()), &buf[..]).unwrap();
        assert_eq!(bytes_read, buf.len());
        assert_eq!(reloaded.trie_id(), ozks.trie_id());
    }

    #[test]
    fn vrf_labels_round_trip_with_proof_verification() {
        let config = OzksConfig { thread_count: 1, ..OzksConfig::default() };
        let ozks = Ozks::new(config, Some(MemoryStorage::new())).unwrap();
        ozks.insert(b"alice".to_vec(), b"payload-a".to_vec());
        ozks.flush().unwrap();

        let query = ozks.query(b"alice").unwrap();
        let commitment = ozks.get_commitment().unwrap();
        assert!(query.verify(&commitment.root_hash, commitment.vrf_public_key.as_ref(), ozks.config.payload_commitment));
    }
}
