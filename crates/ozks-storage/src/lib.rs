//! Storage traits, in-memory backend, LRU caching and batching for the oZKS
//! authenticated dictionary.

pub mod batch;
pub mod cache;
pub mod memory;
pub mod storage_trait;

pub use batch::BatchInsertingStorage;
pub use cache::{CachedStorage, CachedStorageConfig};
pub use memory::MemoryStorage;
pub use storage_trait::{Storage, StorageUpdate};
