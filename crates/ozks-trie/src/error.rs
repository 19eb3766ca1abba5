use thiserror::Error;

use crate::partial_label::PartialLabel;

#[derive(Clone, Debug, Error)]
pub enum TrieError {
    #[error("label {0:?} is already present in the trie")]
    DuplicateKey(PartialLabel),

    #[error("trie invariant violated: {0}")]
    InvariantViolated(String),

    #[error("failed to decode a persisted trie record: {0}")]
    Codec(String),
}

pub type TrieResult<T> = Result<T, TrieError>;
