//! Compressed binary prefix trie used by the oZKS authenticated dictionary.

pub mod error;
pub mod node;
pub mod partial_label;
pub mod trie;

pub use error::{TrieError, TrieResult};
pub use node::{CTNode, LookupPathEntry};
pub use partial_label::PartialLabel;
pub use trie::{AppendProof, CompressedTrie, LabelHashEntry};
