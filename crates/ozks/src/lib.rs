//! An append-only, ordered zero-knowledge set: a compressed binary prefix
//! trie behind VRF-blinded labels, committed payloads and pluggable
//! storage, with membership/non-membership proofs.

pub mod config;
pub mod error;
pub mod ozks;
pub mod proofs;
pub mod vrf_cache;

pub use config::{LabelType, OzksConfig, TrieType};
pub use error::{OzksError, OzksResult};
pub use ozks::{Commitment, Ozks, PendingInsertResult};
pub use proofs::{InsertResult, QueryResult};
