//! The State-Commitment (SC) engine contract and an in-memory reference
//! implementation.
//!
//! The concrete SC tree (a persistent Merkle tree library) is out of
//! scope per spec.md §1 — only its interface matters to the rest of this
//! crate. `MemCommitmentEngine` below is a minimal, in-memory stand-in
//! that satisfies the `CommitmentEngine` contract well enough to make the
//! multi-store's own logic (sorting, hashing, pruning, snapshotting)
//! testable end to end; it is not meant to be disk- or wire-compatible
//! with any real tree implementation.

use crate::error::{Result, StoreError};
use crate::merkle::{self, PathStep};
use crate::types::{CommitInfo, NamedChangeSet, StoreInfo};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One item in the fixed-order snapshot stream: a store header followed
/// by that store's nodes in the export order (spec.md §4.5 / §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotItem {
    /// Begins a new sub-store; subsequent `Iavl` items belong to it.
    Store { name: String },
    /// One tree node. Leaf nodes have `height == 0`.
    Iavl {
        key: Vec<u8>,
        value: Vec<u8>,
        height: i8,
        version: i64,
    },
}

/// The SC engine contract: a persistent, versioned, authenticated tree
/// keyed by sub-store name, shared by every authenticated sub-store.
pub trait CommitmentEngine: Send + Sync {
    /// The highest committed version.
    fn current_version(&self) -> i64;

    /// The canonical, sorted list of authenticated tree names.
    fn tree_names(&self) -> Vec<String>;

    fn has_tree(&self, name: &str) -> bool;
    fn add_tree(&mut self, name: &str) -> Result<()>;
    fn delete_tree(&mut self, name: &str) -> Result<()>;
    /// Create `new_name`, optionally copying the contents of `old_name`.
    fn rename_tree(&mut self, new_name: &str, old_name: &str) -> Result<()>;

    fn get(&self, name: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn get_with_proof(&self, name: &str, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<PathStep>)>;
    fn prefix_iterator(&self, name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Apply change sets at the current (pre-commit) version. Does not
    /// advance the version; `commit` does.
    fn apply(&mut self, changesets: &[NamedChangeSet]) -> Result<()>;

    /// Bump the version and return the resulting `CommitInfo`.
    fn commit(&mut self) -> Result<CommitInfo>;

    /// Preview the `CommitInfo` that `commit` would produce, without
    /// mutating state. Used by `working_hash`.
    fn working_commit_info(&self) -> CommitInfo;

    /// The `CommitInfo` of the version this handle is currently loaded
    /// at (as opposed to `working_commit_info`'s preview of the next
    /// one). Used when loading a version at startup and when serving a
    /// historical query.
    fn committed_commit_info(&self) -> CommitInfo;

    /// Open a read-only handle to a previously committed version.
    fn load_historical(&self, version: i64) -> Result<Box<dyn CommitmentEngine>>;

    /// Discard every committed version strictly greater than `target`.
    fn rollback(&mut self, target: i64) -> Result<()>;

    /// Export the full node stream for `height`, in the fixed order:
    /// for each tree (sorted by name), a `Store` header then its nodes.
    fn export(&self, height: i64) -> Result<Vec<SnapshotItem>>;

    /// Release any resources held by the engine (file handles, background
    /// compaction, etc). The in-memory reference engine has nothing to
    /// release.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Consumes a snapshot's `Store`/`Iavl` item stream and produces a fresh
/// `CommitmentEngine` at the imported height.
pub trait CommitmentImporter {
    fn add_tree(&mut self, name: &str) -> Result<()>;
    fn add_leaf(&mut self, name: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()>;
    fn finalize(self: Box<Self>, height: i64) -> Result<Box<dyn CommitmentEngine>>;
}

fn leaf_hash(key: &[u8], value: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((key.len() as u32).to_be_bytes());
    hasher.update(key);
    hasher.update(value);
    hasher.finalize().into()
}

type TreeData = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory reference `CommitmentEngine`. Keeps every committed version's
/// full data as a snapshot (acceptable for tests and small fixtures; a
/// real tree would keep only the incremental node diffs).
#[derive(Default)]
pub struct MemCommitmentEngine {
    version: i64,
    trees: BTreeMap<String, TreeData>,
    history: BTreeMap<i64, BTreeMap<String, TreeData>>,
    read_only: bool,
}

impl MemCommitmentEngine {
    /// Initialize with the canonical set of authenticated store names.
    pub fn init(names: &[String]) -> Self {
        let trees: BTreeMap<String, TreeData> =
            names.iter().map(|n| (n.clone(), TreeData::new())).collect();
        let mut history = BTreeMap::new();
        history.insert(0, trees.clone());
        Self {
            version: 0,
            trees,
            history,
            read_only: false,
        }
    }

    fn root_hash(&self, name: &str) -> [u8; 32] {
        match self.trees.get(name) {
            Some(tree) => {
                let leaves: Vec<[u8; 32]> =
                    tree.iter().map(|(k, v)| leaf_hash(k, v)).collect();
                merkle::fold(&leaves)
            }
            None => [0u8; 32],
        }
    }

    fn require_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(StoreError::ReadOnlyView(
                "historical SC handle is read-only".into(),
            ));
        }
        Ok(())
    }
}

impl CommitmentEngine for MemCommitmentEngine {
    fn current_version(&self) -> i64 {
        self.version
    }

    fn tree_names(&self) -> Vec<String> {
        self.trees.keys().cloned().collect()
    }

    fn has_tree(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    fn add_tree(&mut self, name: &str) -> Result<()> {
        self.require_writable()?;
        self.trees.entry(name.to_string()).or_default();
        Ok(())
    }

    fn delete_tree(&mut self, name: &str) -> Result<()> {
        self.require_writable()?;
        self.trees.remove(name);
        Ok(())
    }

    fn rename_tree(&mut self, new_name: &str, old_name: &str) -> Result<()> {
        self.require_writable()?;
        let data = self.trees.remove(old_name).unwrap_or_default();
        self.trees.insert(new_name.to_string(), data);
        Ok(())
    }

    fn get(&self, name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let tree = self
            .trees
            .get(name)
            .ok_or_else(|| StoreError::MissingTree(name.to_string()))?;
        Ok(tree.get(key).cloned())
    }

    fn get_with_proof(&self, name: &str, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<PathStep>)> {
        let tree = self
            .trees
            .get(name)
            .ok_or_else(|| StoreError::MissingTree(name.to_string()))?;

        let keys: Vec<&Vec<u8>> = tree.keys().collect();
        let leaves: Vec<[u8; 32]> = tree.iter().map(|(k, v)| leaf_hash(k, v)).collect();

        if leaves.is_empty() {
            return Ok((None, Vec::new()));
        }

        match keys.iter().position(|k| k.as_slice() == key) {
            Some(idx) => {
                let value = tree.get(key).cloned();
                let path = merkle::path_for(&leaves, idx).expect("idx in range");
                Ok((value, path))
            }
            None => {
                // Non-membership: witness the nearest existing leaf. A real
                // tree would prove the absent key falls between two
                // adjacent leaves; this reference engine only guarantees
                // the proof is non-empty and verifies against the root.
                let path = merkle::path_for(&leaves, 0).expect("non-empty tree");
                Ok((None, path))
            }
        }
    }

    fn prefix_iterator(&self, name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let tree = self
            .trees
            .get(name)
            .ok_or_else(|| StoreError::MissingTree(name.to_string()))?;
        Ok(tree
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&mut self, changesets: &[NamedChangeSet]) -> Result<()> {
        self.require_writable()?;
        for cs in changesets {
            let tree = self
                .trees
                .get_mut(&cs.name)
                .ok_or_else(|| StoreError::MissingTree(cs.name.clone()))?;
            for pair in &cs.changeset.pairs {
                if pair.delete {
                    tree.remove(&pair.key);
                } else {
                    tree.insert(pair.key.clone(), pair.value.clone());
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<CommitInfo> {
        self.require_writable()?;
        self.version += 1;
        self.history.insert(self.version, self.trees.clone());

        let store_infos = self
            .tree_names()
            .into_iter()
            .map(|name| {
                let hash = self.root_hash(&name).to_vec();
                StoreInfo {
                    name,
                    commit_id: crate::types::CommitID {
                        version: self.version,
                        hash,
                    },
                }
            })
            .collect();

        Ok(CommitInfo {
            version: self.version,
            store_infos,
        }
        .sorted())
    }

    fn working_commit_info(&self) -> CommitInfo {
        let store_infos = self
            .tree_names()
            .into_iter()
            .map(|name| crate::types::StoreInfo {
                name: name.clone(),
                commit_id: crate::types::CommitID {
                    version: self.version + 1,
                    hash: self.root_hash(&name).to_vec(),
                },
            })
            .collect();

        CommitInfo {
            version: self.version + 1,
            store_infos,
        }
        .sorted()
    }

    fn committed_commit_info(&self) -> CommitInfo {
        let store_infos = self
            .tree_names()
            .into_iter()
            .map(|name| crate::types::StoreInfo {
                name: name.clone(),
                commit_id: crate::types::CommitID {
                    version: self.version,
                    hash: self.root_hash(&name).to_vec(),
                },
            })
            .collect();

        CommitInfo {
            version: self.version,
            store_infos,
        }
        .sorted()
    }

    fn load_historical(&self, version: i64) -> Result<Box<dyn CommitmentEngine>> {
        let trees = self
            .history
            .get(&version)
            .cloned()
            .ok_or(StoreError::PrunedHeight(version))?;
        let mut history = BTreeMap::new();
        history.insert(version, trees.clone());
        Ok(Box::new(MemCommitmentEngine {
            version,
            trees,
            history,
            read_only: true,
        }))
    }

    fn rollback(&mut self, target: i64) -> Result<()> {
        self.history.retain(|&v, _| v <= target);
        self.trees = self
            .history
            .get(&target)
            .cloned()
            .ok_or(StoreError::PrunedHeight(target))?;
        self.version = target;
        Ok(())
    }

    fn export(&self, height: i64) -> Result<Vec<SnapshotItem>> {
        let trees = self
            .history
            .get(&height)
            .ok_or(StoreError::PrunedHeight(height))?;

        let mut items = Vec::new();
        for (name, data) in trees {
            items.push(SnapshotItem::Store { name: name.clone() });
            for (key, value) in data {
                items.push(SnapshotItem::Iavl {
                    key: key.clone(),
                    value: value.clone(),
                    height: 0,
                    version: height,
                });
            }
        }
        Ok(items)
    }
}

/// Builds a fresh `MemCommitmentEngine` from a `Store`/`Iavl` item stream.
#[derive(Default)]
pub struct MemCommitmentImporter {
    trees: BTreeMap<String, TreeData>,
    current: Option<String>,
}

impl CommitmentImporter for MemCommitmentImporter {
    fn add_tree(&mut self, name: &str) -> Result<()> {
        self.trees.entry(name.to_string()).or_default();
        self.current = Some(name.to_string());
        Ok(())
    }

    fn add_leaf(&mut self, name: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let tree = self
            .trees
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingTree(name.to_string()))?;
        tree.insert(key, value);
        Ok(())
    }

    fn finalize(self: Box<Self>, height: i64) -> Result<Box<dyn CommitmentEngine>> {
        let mut history = BTreeMap::new();
        history.insert(height, self.trees.clone());
        Ok(Box::new(MemCommitmentEngine {
            version: height,
            trees: self.trees,
            history,
            read_only: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeSet, KVPair};

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    fn cs(name: &str, key: &str, value: &str) -> NamedChangeSet {
        NamedChangeSet {
            name: name.to_string(),
            changeset: ChangeSet {
                pairs: vec![KVPair {
                    key: key.as_bytes().to_vec(),
                    value: value.as_bytes().to_vec(),
                    delete: false,
                }],
            },
        }
    }

    #[test]
    fn test_order_independent_hash() {
        let mut e1 = MemCommitmentEngine::init(&names());
        e1.apply(&[cs("c", "k", "1"), cs("a", "k", "1"), cs("b", "k", "1")])
            .unwrap();
        let info1 = e1.commit().unwrap();

        let mut e2 = MemCommitmentEngine::init(&names());
        e2.apply(&[cs("a", "k", "1"), cs("b", "k", "1"), cs("c", "k", "1")])
            .unwrap();
        let info2 = e2.commit().unwrap();

        assert_eq!(info1.app_hash(), info2.app_hash());
    }

    #[test]
    fn test_get_with_proof_roundtrip() {
        let mut e = MemCommitmentEngine::init(&names());
        e.apply(&[cs("a", "acct/1", "100")]).unwrap();
        let info = e.commit().unwrap();

        let (value, path) = e.get_with_proof("a", b"acct/1").unwrap();
        assert_eq!(value, Some(b"100".to_vec()));
        assert!(!path.is_empty());

        let leaf = super::leaf_hash(b"acct/1", b"100");
        let recomputed = merkle::verify_path(leaf, &path);
        let a_hash = info
            .store_infos
            .iter()
            .find(|s| s.name == "a")
            .unwrap()
            .commit_id
            .hash
            .clone();
        assert_eq!(recomputed.to_vec(), a_hash);
    }

    #[test]
    fn test_historical_read() {
        let mut e = MemCommitmentEngine::init(&names());
        e.apply(&[cs("a", "k", "v1")]).unwrap();
        e.commit().unwrap(); // version 1

        e.apply(&[cs("a", "k", "v2")]).unwrap();
        e.commit().unwrap(); // version 2

        let hist1 = e.load_historical(1).unwrap();
        assert_eq!(hist1.get("a", b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(e.get("a", b"k").unwrap(), Some(b"v2".to_vec()));

        // Historical handle is read-only.
        let mut hist1 = e.load_historical(1).unwrap();
        assert!(hist1
            .apply(&[cs("a", "k", "v3")])
            .is_err());
    }

    #[test]
    fn test_rename_and_delete_tree() {
        let mut e = MemCommitmentEngine::init(&["old".to_string()]);
        e.apply(&[cs("old", "k", "v")]).unwrap();
        e.rename_tree("new", "old").unwrap();
        assert!(!e.has_tree("old"));
        assert_eq!(e.get("new", b"k").unwrap(), Some(b"v".to_vec()));

        e.delete_tree("new").unwrap();
        assert!(!e.has_tree("new"));
    }

    #[test]
    fn test_export_import_roundtrip() {
        let mut e = MemCommitmentEngine::init(&names());
        e.apply(&[cs("a", "k1", "v1"), cs("b", "k2", "v2")])
            .unwrap();
        let info = e.commit().unwrap();
        assert_eq!(info.version, 1);

        let items = e.export(1).unwrap();
        let mut importer: Box<dyn CommitmentImporter> =
            Box::new(MemCommitmentImporter::default());
        let mut current = String::new();
        for item in items {
            match item {
                SnapshotItem::Store { name } => {
                    current = name.clone();
                    importer.add_tree(&name).unwrap();
                }
                SnapshotItem::Iavl { key, value, .. } => {
                    importer.add_leaf(&current, key, value).unwrap();
                }
            }
        }
        let restored = importer.finalize(1).unwrap();
        assert_eq!(restored.current_version(), 1);
        assert_eq!(restored.get("a", b"k1").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(restored.get("b", b"k2").unwrap(), Some(b"v2".to_vec()));
    }
}
