//! A small binary Merkle fold shared by the app-hash derivation
//! (`types::CommitInfo::app_hash`) and the in-memory reference SC tree's
//! per-store root/proof computation.
//!
//! Leaves are folded pairwise with SHA-256, duplicating the last node when
//! a level has an odd count. This is an explicit, original convention —
//! the real SC tree's hashing algorithm is out of scope (see spec.md §1) —
//! but it gives every caller of this module the same deterministic,
//! order-stable root and an inclusion path that verifies against it.

use sha2::{Digest, Sha256};

fn parent_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Fold a list of leaf hashes into a single root. Empty input folds to an
/// all-zero root (callers that need "no store infos" to mean "empty hash"
/// check emptiness themselves, as `CommitInfo::app_hash` does).
pub fn fold(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            next.push(parent_hash(&pair[0], pair.get(1).unwrap_or(&pair[0])));
        }
        level = next;
    }
    level[0]
}

/// One step of an inclusion path: the sibling hash and whether the sibling
/// sits to the right of the node being proven (needed to combine in the
/// right order when recomputing the root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub sibling: [u8; 32],
    pub sibling_is_right: bool,
}

/// Compute the inclusion path from `leaves[index]` up to the root produced
/// by `fold`. Returns `None` if `index` is out of range.
pub fn path_for(leaves: &[[u8; 32]], index: usize) -> Option<Vec<PathStep>> {
    if index >= leaves.len() {
        return None;
    }
    let mut level = leaves.to_vec();
    let mut idx = index;
    let mut path = Vec::new();

    while level.len() > 1 {
        let pair_start = idx - (idx % 2);
        let (left, right) = (level[pair_start], *level.get(pair_start + 1).unwrap_or(&level[pair_start]));
        if idx % 2 == 0 {
            path.push(PathStep {
                sibling: right,
                sibling_is_right: true,
            });
        } else {
            path.push(PathStep {
                sibling: left,
                sibling_is_right: false,
            });
        }

        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            next.push(parent_hash(&pair[0], pair.get(1).unwrap_or(&pair[0])));
        }
        level = next;
        idx /= 2;
    }

    Some(path)
}

/// Recompute the root from a leaf and its path, for verification.
pub fn verify_path(leaf: [u8; 32], path: &[PathStep]) -> [u8; 32] {
    let mut current = leaf;
    for step in path {
        current = if step.sibling_is_right {
            parent_hash(&current, &step.sibling)
        } else {
            parent_hash(&step.sibling, &current)
        };
    }
    current
}
