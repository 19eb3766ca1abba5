//! A compressed trie node.
//!
//! This port collapses the original's three node variants (`CTNodeLinked`,
//! `CTNodeStored`, `CTNodeLinkedNoStorage` in `oZKS/ct_node*.{h,cpp}`) into
//! one owned tree (`Option<Box<CTNode>>` children), since `CompressedTrie`
//! persists and reloads its whole node set as a unit (see `trie.rs`) rather
//! than lazily paging individual nodes in and out of storage the way the
//! original's `CTNodeStored::left()`/`right()` do. The insert/lookup/
//! hash-update algorithms below are otherwise a direct port of
//! `oZKS/ct_node.cpp`.

use ozks_crypto::hash::{leaf_hash, node_hash, Hash};

use crate::error::{TrieError, TrieResult};
use crate::partial_label::PartialLabel;

/// One membership-path or non-membership-path entry: a label and the hash
/// recorded at that label when the entry was visited.
pub type LookupPathEntry = (PartialLabel, Hash);

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CTNode {
    label: PartialLabel,
    hash: Hash,
    dirty: bool,
    left: Option<Box<CTNode>>,
    right: Option<Box<CTNode>>,
}

impl CTNode {
    /// A fresh, empty trie root: a leaf (no children) holding no content.
    pub fn new_root() -> Self {
        CTNode { label: PartialLabel::empty(), hash: [0u8; 64], dirty: false, left: None, right: None }
    }

    pub fn label(&self) -> &PartialLabel {
        &self.label
    }

    /// The node's hash. Fails with [`TrieError::InvariantViolated`] if the
    /// node is still dirty, i.e. [`CTNode::recompute_hashes`] has not run
    /// since its last mutation — a caller asking for a commitment hash must
    /// never silently receive a stale one.
    pub fn hash(&self) -> TrieResult<Hash> {
        if self.dirty {
            return Err(TrieError::InvariantViolated(
                "hash requested on a dirty node before recompute_hashes ran".into(),
            ));
        }
        Ok(self.hash)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.label.is_empty()
    }

    /// True only for a trie that has never received an insertion: the root
    /// is still a leaf with no content.
    pub fn is_empty_trie(&self) -> bool {
        self.is_root() && self.is_leaf()
    }

    pub fn left(&self) -> Option<&CTNode> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&CTNode> {
        self.right.as_deref()
    }

    /// Collects mutable references to every subtree exactly `levels` below
    /// `self`, in bit order (the all-zero-bits subtree first), for a
    /// parallel batch insert to hand each worker its own disjoint partition.
    /// Returns `None` if any node on the way down is missing a child or is a
    /// leaf before reaching `levels`, which the caller takes as "this many
    /// levels cannot be parallelized" (spec's "requires all top-`root_levels`
    /// subtrees to exist").
    pub fn subtrees_at_depth(&mut self, levels: u32) -> Option<Vec<&mut CTNode>> {
        if levels == 0 {
            return Some(vec![self]);
        }
        let (left, right) = match (&mut self.left, &mut self.right) {
            (Some(left), Some(right)) => (left, right),
            _ => return None,
        };
        let mut subtrees = left.subtrees_at_depth(levels - 1)?;
        subtrees.extend(right.subtrees_at_depth(levels - 1)?);
        Some(subtrees)
    }

    /// Marks `self` and every ancestor down to (but not including) depth
    /// `levels` dirty, used after a parallel batch insert: the workers
    /// already recomputed and cleaned their own subtree roots at depth
    /// `levels`, so only the shared top needs the serial merge pass to
    /// recombine it.
    pub fn mark_dirty_to_depth(&mut self, levels: u32) {
        self.dirty = true;
        if levels == 0 {
            return;
        }
        if let Some(left) = &mut self.left {
            left.mark_dirty_to_depth(levels - 1);
        }
        if let Some(right) = &mut self.right {
            right.mark_dirty_to_depth(levels - 1);
        }
    }

    fn new_leaf(label: PartialLabel, payload_hash: Hash, epoch: u64) -> Box<CTNode> {
        let hash = leaf_hash(&label.to_bytes(), &payload_hash, epoch);
        Box::new(CTNode { label, hash, dirty: false, left: None, right: None })
    }

    fn new_leaf_from_existing(label: PartialLabel, hash: Hash) -> Box<CTNode> {
        Box::new(CTNode { label, hash, dirty: false, left: None, right: None })
    }

    fn new_branch(label: PartialLabel, left: Option<Box<CTNode>>, right: Option<Box<CTNode>>) -> Box<CTNode> {
        Box::new(CTNode { label, hash: [0u8; 64], dirty: true, left, right })
    }

    /// Inserts `insert_label` with payload hash `payload_hash` at `epoch`.
    /// Direct port of `CTNode::insert` in `oZKS/ct_node.cpp`.
    pub fn insert(&mut self, insert_label: &PartialLabel, payload_hash: Hash, epoch: u64) -> TrieResult<()> {
        if *insert_label == self.label {
            return Err(TrieError::DuplicateKey(insert_label.clone()));
        }

        let common = PartialLabel::common_prefix(insert_label, &self.label);
        let next_bit = insert_label.bit(common.bit_count());

        if self.is_leaf() && !self.is_root() {
            let existing_label = self.label;
            let existing_hash = self.hash;
            if !next_bit {
                self.left = Some(Self::new_leaf(insert_label.clone(), payload_hash, epoch));
                self.right = Some(Self::new_leaf_from_existing(existing_label, existing_hash));
            } else {
                self.left = Some(Self::new_leaf_from_existing(existing_label, existing_hash));
                self.right = Some(Self::new_leaf(insert_label.clone(), payload_hash, epoch));
            }
            self.label = common;
            self.dirty = true;
            return Ok(());
        }

        let right_continues =
            next_bit && self.right.as_ref().is_some_and(|r| r.label.bit(common.bit_count()));
        let left_continues =
            !next_bit && self.left.as_ref().is_some_and(|l| !l.label.bit(common.bit_count()));

        if right_continues {
            self.right.as_mut().expect("checked above").insert(insert_label, payload_hash, epoch)?;
            self.dirty = true;
            return Ok(());
        }
        if left_continues {
            self.left.as_mut().expect("checked above").insert(insert_label, payload_hash, epoch)?;
            self.dirty = true;
            return Ok(());
        }

        // No route: insert at this level, splitting off a new intermediate
        // node that inherits this node's current identity and children.
        if next_bit {
            if self.right.is_none() {
                self.right = Some(Self::new_leaf(insert_label.clone(), payload_hash, epoch));
                self.dirty = true;
                return Ok(());
            }
            let old_left = self.left.take();
            let old_right = self.right.take();
            self.left = Some(Self::new_branch(self.label, old_left, old_right));
            self.right = Some(Self::new_leaf(insert_label.clone(), payload_hash, epoch));
        } else {
            if self.left.is_none() {
                self.left = Some(Self::new_leaf(insert_label.clone(), payload_hash, epoch));
                self.dirty = true;
                return Ok(());
            }
            let old_left = self.left.take();
            let old_right = self.right.take();
            self.right = Some(Self::new_branch(self.label, old_left, old_right));
            self.left = Some(Self::new_leaf(insert_label.clone(), payload_hash, epoch));
        }

        self.label = common;
        self.dirty = true;
        Ok(())
    }

    /// Recomputes the hashes of every dirty node in a single post-order
    /// pass, returning this node's final hash. `root_levels` lets the serial
    /// merge after a parallel batch insert stop descending once it reaches
    /// depth `root_levels`: those subtree roots were already recomputed (and
    /// cleaned) by their own worker, so only the shared top `root_levels`
    /// levels still need a `node_hash` recombination here (spec's parallel
    /// batch insertion, §4.3.1).
    pub fn recompute_hashes(&mut self, level: u32, root_levels: u32) -> Hash {
        if root_levels > 0 && level >= root_levels {
            return self.hash;
        }
        if self.is_leaf() || !self.dirty {
            return self.hash;
        }

        let (left_label, left_hash) = match &mut self.left {
            Some(l) => (l.label.to_bytes(), l.recompute_hashes(level + 1, root_levels)),
            None => (Vec::new(), [0u8; 64]),
        };
        let (right_label, right_hash) = match &mut self.right {
            Some(r) => (r.label.to_bytes(), r.recompute_hashes(level + 1, root_levels)),
            None => (Vec::new(), [0u8; 64]),
        };

        self.hash = node_hash(&left_label, &left_hash, &right_label, &right_hash);
        self.dirty = false;
        self.hash
    }

    /// Builds the membership (found=true) or non-membership (found=false)
    /// proof path for `lookup_label`. Direct port of the recursive `lookup`
    /// overload in `oZKS/ct_node.cpp`.
    pub fn lookup(&self, lookup_label: &PartialLabel, path: &mut Vec<LookupPathEntry>, include_searched: bool) -> bool {
        if self.label == *lookup_label {
            if include_searched {
                path.push((self.label, self.hash));
            }
            return true;
        }

        if self.is_leaf() {
            return false;
        }

        let common_count = PartialLabel::common_prefix_count(lookup_label, &self.label);
        let next_bit = lookup_label.bit(common_count);

        let mut found = false;
        let mut sibling: Option<&CTNode> = None;

        if next_bit {
            if let Some(right) = &self.right {
                if right.label.bit(common_count) {
                    found = right.lookup(lookup_label, path, include_searched);
                    sibling = self.left.as_deref();
                }
            }
        } else if let Some(left) = &self.left {
            if !left.label.bit(common_count) {
                found = left.lookup(lookup_label, path, include_searched);
                sibling = self.right.as_deref();
            }
        }

        if !found && path.is_empty() {
            if let Some(left) = &self.left {
                path.push((left.label, left.hash));
            }
            if let Some(right) = &self.right {
                path.push((right.label, right.hash));
            }
            if !self.is_empty_trie() {
                path.push((self.label, self.hash));
            }
        } else if let Some(sibling) = sibling {
            path.push((sibling.label, sibling.hash));
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_from_str(bits: &str) -> PartialLabel {
        PartialLabel::from_bits(&bits.chars().map(|c| c == '1').collect::<Vec<_>>())
    }

    #[test]
    fn insert_into_empty_root_creates_single_child() {
        let mut root = CTNode::new_root();
        let label = label_from_str("10");
        root.insert(&label, [1u8; 64], 0).unwrap();
        assert!(root.is_root());
        assert!(root.right().is_some());
        assert!(root.left().is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut root = CTNode::new_root();
        let label = label_from_str("10");
        root.insert(&label, [1u8; 64], 0).unwrap();
        let err = root.insert(&label, [2u8; 64], 1).unwrap_err();
        assert!(matches!(err, TrieError::DuplicateKey(_)));
    }

    #[test]
    fn second_insert_splits_leaf() {
        let mut root = CTNode::new_root();
        root.insert(&label_from_str("100"), [1u8; 64], 0).unwrap();
        root.insert(&label_from_str("010"), [2u8; 64], 0).unwrap();
        root.recompute_hashes(0, 0);
        assert!(root.left().is_some());
        assert!(root.right().is_some());
    }

    #[test]
    fn lookup_finds_inserted_label() {
        let mut root = CTNode::new_root();
        let label = label_from_str("1010");
        root.insert(&label, [7u8; 64], 0).unwrap();
        root.insert(&label_from_str("0101"), [8u8; 64], 1).unwrap();
        root.recompute_hashes(0, 0);

        let mut path = Vec::new();
        let found = root.lookup(&label, &mut path, true);
        assert!(found);
        assert_eq!(path[0].0, label);
    }

    #[test]
    fn lookup_builds_non_membership_path_for_missing_label() {
        let mut root = CTNode::new_root();
        root.insert(&label_from_str("1010"), [7u8; 64], 0).unwrap();
        root.insert(&label_from_str("0101"), [8u8; 64], 1).unwrap();
        root.recompute_hashes(0, 0);

        let mut path = Vec::new();
        let found = root.lookup(&label_from_str("1100"), &mut path, true);
        assert!(!found);
        assert!(!path.is_empty());
    }

    #[test]
    fn recompute_hashes_clears_dirty_bit() {
        let mut root = CTNode::new_root();
        root.insert(&label_from_str("10"), [1u8; 64], 0).unwrap();
        root.insert(&label_from_str("01"), [2u8; 64], 0).unwrap();
        assert!(root.is_dirty());
        root.recompute_hashes(0, 0);
        assert!(!root.is_dirty());
    }
}
