//! The State-Storage (SS) engine contract and an in-memory reference
//! implementation.
//!
//! The concrete SS backend (an LSM/KV engine) is out of scope per
//! spec.md §1; `MemStateStorage` is a minimal stand-in good enough to
//! exercise the async apply/pruning loops and the historical query path.

use crate::error::{Result, StoreError};
use crate::types::NamedChangeSet;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;

/// One leaf record streamed into the SS importer during snapshot restore.
#[derive(Debug, Clone)]
pub struct LeafRecord {
    pub store: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// The SS engine contract: an unauthenticated, versioned KV store with
/// range scans, per-version pruning, and bulk import.
pub trait StateStorage: Send + Sync {
    /// The highest version SS has applied a change set for.
    fn latest_version(&self) -> i64;

    /// Apply one sub-store's change set at `version`. Must be called in
    /// ascending, gap-free version order by the caller.
    fn apply_changeset(&mut self, version: i64, changeset: &NamedChangeSet) -> Result<()>;

    fn get(&self, store: &str, key: &[u8], version: i64) -> Result<Option<Vec<u8>>>;
    fn prefix_iterator(
        &self,
        store: &str,
        prefix: &[u8],
        version: i64,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Delete every version `<= up_to_and_including`.
    fn prune(&mut self, up_to_and_including: i64) -> Result<()>;

    /// The oldest version still retained (for `PrunedHeight` checks).
    fn oldest_version(&self) -> i64;

    /// Bulk-load leaf records streamed from a snapshot restore, replacing
    /// all prior content and setting `latest_version` to `height`.
    fn import(&mut self, height: i64, records: Receiver<LeafRecord>) -> Result<()>;

    /// Release any resources held by the engine. The in-memory reference
    /// engine has nothing to release.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory reference `StateStorage`. Keeps one map per version, so a
/// read at height V must find the value live at or before V — implemented
/// here as a per-store, per-key history of (version, Option<value>)
/// entries, searched by the largest version `<= V`.
#[derive(Default)]
pub struct MemStateStorage {
    // store -> key -> sorted (version, value_or_tombstone)
    data: BTreeMap<String, BTreeMap<Vec<u8>, Vec<(i64, Option<Vec<u8>>)>>>,
    latest_version: i64,
    oldest_version: i64,
}

impl MemStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn value_at(&self, store: &str, key: &[u8], version: i64) -> Option<Vec<u8>> {
        let entries = self.data.get(store)?.get(key)?;
        entries
            .iter()
            .rev()
            .find(|(v, _)| *v <= version)
            .and_then(|(_, value)| value.clone())
    }
}

impl StateStorage for MemStateStorage {
    fn latest_version(&self) -> i64 {
        self.latest_version
    }

    fn apply_changeset(&mut self, version: i64, changeset: &NamedChangeSet) -> Result<()> {
        let store = self.data.entry(changeset.name.clone()).or_default();
        for pair in &changeset.changeset.pairs {
            let entry = store.entry(pair.key.clone()).or_default();
            let value = if pair.delete {
                None
            } else {
                Some(pair.value.clone())
            };
            entry.push((version, value));
        }
        self.latest_version = self.latest_version.max(version);
        Ok(())
    }

    fn get(&self, store: &str, key: &[u8], version: i64) -> Result<Option<Vec<u8>>> {
        if version < self.oldest_version {
            return Err(StoreError::PrunedHeight(version));
        }
        Ok(self.value_at(store, key, version))
    }

    fn prefix_iterator(
        &self,
        store: &str,
        prefix: &[u8],
        version: i64,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if version < self.oldest_version {
            return Err(StoreError::PrunedHeight(version));
        }
        let Some(keys) = self.data.get(store) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for key in keys.keys().filter(|k| k.starts_with(prefix)) {
            if let Some(value) = self.value_at(store, key, version) {
                out.push((key.clone(), value));
            }
        }
        Ok(out)
    }

    fn prune(&mut self, up_to_and_including: i64) -> Result<()> {
        for entries in self.data.values_mut() {
            for history in entries.values_mut() {
                // Keep at most the newest entry `<= up_to_and_including`
                // plus everything after it, so reads just above the
                // pruned boundary still resolve correctly.
                if let Some(cutoff_pos) = history
                    .iter()
                    .rposition(|(v, _)| *v <= up_to_and_including)
                {
                    history.drain(0..cutoff_pos);
                }
            }
        }
        self.oldest_version = self.oldest_version.max(up_to_and_including + 1);
        Ok(())
    }

    fn oldest_version(&self) -> i64 {
        self.oldest_version
    }

    fn import(&mut self, height: i64, records: Receiver<LeafRecord>) -> Result<()> {
        self.data.clear();
        for record in records {
            let store = self.data.entry(record.store).or_default();
            store
                .entry(record.key)
                .or_default()
                .push((height, Some(record.value)));
        }
        self.latest_version = height;
        self.oldest_version = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeSet, KVPair};
    use std::sync::mpsc::sync_channel;

    fn named(name: &str, key: &str, value: &str) -> NamedChangeSet {
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
    fn test_historical_versions() {
        let mut ss = MemStateStorage::new();
        ss.apply_changeset(1, &named("s", "k", "v1")).unwrap();
        ss.apply_changeset(2, &named("s", "k", "v2")).unwrap();

        assert_eq!(ss.get("s", b"k", 1).unwrap(), Some(b"v1".to_vec()));
        assert_eq!(ss.get("s", b"k", 2).unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_pruning_evicts_old_versions() {
        let mut ss = MemStateStorage::new();
        for v in 1..=20 {
            ss.apply_changeset(v, &named("s", "k", "v")).unwrap();
        }
        ss.prune(15).unwrap();

        assert!(ss.get("s", b"k", 10).is_err());
        assert!(ss.get("s", b"k", 18).is_ok());
    }

    #[test]
    fn test_import_replaces_state() {
        let mut ss = MemStateStorage::new();
        ss.apply_changeset(1, &named("s", "old", "x")).unwrap();

        let (tx, rx) = sync_channel(4);
        tx.send(LeafRecord {
            store: "s".into(),
            key: b"new".to_vec(),
            value: b"y".to_vec(),
        })
        .unwrap();
        drop(tx);
        ss.import(10, rx).unwrap();

        assert_eq!(ss.latest_version(), 10);
        assert_eq!(ss.get("s", b"new", 10).unwrap(), Some(b"y".to_vec()));
        assert!(ss.get("s", b"old", 10).unwrap().is_none());
    }
}
