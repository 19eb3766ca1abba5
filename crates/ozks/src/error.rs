//! Top-level error type for the oZKS façade.
//!
//! Grounded on spec.md §7's error-kind table and `oZKS/utilities.h`'s
//! `ozks_error` hierarchy: a flat, closed set of kinds rather than one
//! variant per failing call site, since callers are expected to branch on
//! the kind rather than on a specific operation.

use ozks_trie::TrieError;

pub type OzksResult<T> = Result<T, OzksError>;

#[derive(Debug, thiserror::Error)]
pub enum OzksError {
    #[error("key already present in the trie")]
    DuplicateKey,

    #[error("proof failed to verify")]
    InvalidProof,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolated(String),

    #[error("key not found")]
    NotFound,

    #[error("capacity exhausted: {0}")]
    ExhaustedCapacity(String),

    /// Storage is generic over the backend's own `Storage::Error`, so it is
    /// folded to a string here rather than kept as a typed `#[from]` source.
    #[error("storage backend error: {0}")]
    Storage(String),
}

impl OzksError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        OzksError::Storage(err.to_string())
    }
}

impl From<TrieError> for OzksError {
    fn from(err: TrieError) -> Self {
        match err {
            TrieError::DuplicateKey(_) => OzksError::DuplicateKey,
            TrieError::InvariantViolated(msg) => OzksError::InvariantViolated(msg),
            TrieError::Codec(msg) => OzksError::InvalidEncoding(msg),
        }
    }
}
