//! A fixed-capacity cache from VRF input to its computed proof.
//!
//! Grounded on `oZKS/vrf_cache.h`/`.cpp`: a capacity-bounded LRU keyed by a
//! hash of the VRF input (so keys of arbitrary length hash to a fixed-size
//! cache key), with atomic hit/miss counters that survive `clear_contents`.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;
use ozks_crypto::hash::{compute_hash, Hash};
use ozks_crypto::vrf::VrfProof;

const CACHE_KEY_DOMAIN: &str = "vrf_cache_key";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VrfCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Caches `(VrfProof, output_hash)` pairs keyed by VRF input. A `capacity`
/// of zero disables caching (every lookup is a recorded miss; nothing is
/// ever stored).
pub struct VrfCache {
    cache: Mutex<Option<LruCache<Hash, (VrfProof, Hash)>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl VrfCache {
    pub fn new(capacity: usize) -> Self {
        let cache = NonZeroUsize::new(capacity).map(LruCache::new);
        VrfCache { cache: Mutex::new(cache), hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    pub fn get(&self, data: &[u8]) -> Option<(VrfProof, Hash)> {
        let key = cache_key(data);
        let mut guard = self.cache.lock().expect("VRF cache lock poisoned");
        let Some(cache) = guard.as_mut() else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        match cache.get(&key) {
            Some(hit) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(*hit)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, data: &[u8], proof: VrfProof, output: Hash) {
        let key = cache_key(data);
        let mut guard = self.cache.lock().expect("VRF cache lock poisoned");
        if let Some(cache) = guard.as_mut() {
            // `push`, unlike `put`, hands back the evicted entry so a real
            // capacity eviction (a different key than the one just inserted)
            // can be told apart from simply overwriting an existing value.
            if let Some((evicted_key, _)) = cache.push(key, (proof, output)) {
                if evicted_key != key {
                    tracing::debug!(capacity = cache.cap().get(), "VRF cache evicted an entry to make room");
                }
            }
        }
    }

    /// Empties the cache's contents without resetting the hit/miss counters.
    pub fn clear_contents(&self) {
        let mut guard = self.cache.lock().expect("VRF cache lock poisoned");
        if let Some(cache) = guard.as_mut() {
            cache.clear();
        }
    }

    pub fn stats(&self) -> VrfCacheStats {
        VrfCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

fn cache_key(data: &[u8]) -> Hash {
    compute_hash(data, CACHE_KEY_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ozks_crypto::vrf::VrfSecretKey;

    fn sample_proof() -> (VrfProof, Hash) {
        let sk = VrfSecretKey::generate();
        sk.prove(b"some key").expect("prove should succeed")
    }

    #[test]
    fn miss_then_put_then_hit() {
        let cache = VrfCache::new(8);
        assert!(cache.get(b"key").is_none());
        let (proof, output) = sample_proof();
        cache.put(b"key", proof, output);
        assert!(cache.get(b"key").is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn zero_capacity_cache_always_misses() {
        let cache = VrfCache::new(0);
        let (proof, output) = sample_proof();
        cache.put(b"key", proof, output);
        assert!(cache.get(b"key").is_none());
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn clear_contents_preserves_counters() {
        let cache = VrfCache::new(8);
        let (proof, output) = sample_proof();
        cache.put(b"key", proof, output);
        cache.get(b"key");
        let before = cache.stats();
        cache.clear_contents();
        assert!(cache.get(b"key").is_none());
        let after = cache.stats();
        assert_eq!(after.hits, before.hits);
        assert!(after.misses > before.misses);
    }
}
