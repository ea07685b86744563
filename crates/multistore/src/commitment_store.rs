//! The Commitment Sub-Store: adapts one SC tree to the KV contract and
//! buffers in-flight writes as a change set until the next flush.

use crate::error::Result;
use crate::kv::{require_nonempty_key, KVStore};
use crate::merkle::PathStep;
use crate::sc::CommitmentEngine;
use crate::types::{ChangeSet, KVPair};
use std::sync::{Arc, Mutex, RwLock};

/// Wraps one named authenticated tree inside the shared SC engine.
///
/// Writes and `pop_change_set` are externally serialized by the root
/// multi-store (see spec §4.2); this type only needs to be internally
/// consistent against itself, not fully lock-free.
pub struct CommitmentStore {
    engine: Arc<RwLock<Box<dyn CommitmentEngine>>>,
    name: String,
    pending: Mutex<Vec<KVPair>>,
}

impl CommitmentStore {
    pub fn new(engine: Arc<RwLock<Box<dyn CommitmentEngine>>>, name: impl Into<String>) -> Self {
        Self {
            engine,
            name: name.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomically return the pending change set since the last pop and
    /// reset the buffer. Empties are not filtered here — the caller
    /// (the root's flush step) decides whether to drop empty sets.
    pub fn pop_change_set(&self) -> ChangeSet {
        let mut pending = self.pending.lock().expect("pending lock poisoned");
        ChangeSet {
            pairs: std::mem::take(&mut *pending),
        }
    }

    /// Read a value with a Merkle proof from the key to this store's SC
    /// root. Only meaningful against an already-committed tree; any
    /// buffered-but-unflushed writes are not reflected.
    pub fn get_with_proof(&self, key: &[u8]) -> Result<(Option<Vec<u8>>, Vec<PathStep>)> {
        self.engine
            .read()
            .expect("sc engine lock poisoned")
            .get_with_proof(&self.name, key)
    }

    /// Buffer a write. Takes `&self`: the buffer is a `Mutex`, so this is
    /// safe to call through a shared `Arc<CommitmentStore>` as well as
    /// through the `KVStore` trait's `&mut self` methods below.
    pub fn push_set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        require_nonempty_key(key)?;
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .push(KVPair {
                key: key.to_vec(),
                value: value.to_vec(),
                delete: false,
            });
        Ok(())
    }

    /// Buffer a delete. See `push_set` for why this takes `&self`.
    pub fn push_delete(&self, key: &[u8]) -> Result<()> {
        require_nonempty_key(key)?;
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .push(KVPair {
                key: key.to_vec(),
                value: Vec::new(),
                delete: true,
            });
        Ok(())
    }

    pub fn root_hash(&self) -> Result<Vec<u8>> {
        let engine = self.engine.read().expect("sc engine lock poisoned");
        let info = engine.working_commit_info();
        Ok(info
            .store_infos
            .iter()
            .find(|s| s.name == self.name)
            .map(|s| s.commit_id.hash.clone())
            .unwrap_or_default())
    }
}

impl KVStore for CommitmentStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        require_nonempty_key(key)?;
        {
            let pending = self.pending.lock().expect("pending lock poisoned");
            if let Some(pair) = pending.iter().rev().find(|p| p.key == key) {
                return Ok(if pair.delete {
                    None
                } else {
                    Some(pair.value.clone())
                });
            }
        }
        self.engine
            .read()
            .expect("sc engine lock poisoned")
            .get(&self.name, key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.push_set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.push_delete(key)
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let mut merged: std::collections::BTreeMap<Vec<u8>, Vec<u8>> = self
            .engine
            .read()
            .expect("sc engine lock poisoned")
            .prefix_iterator(&self.name, prefix)
            .unwrap_or_default()
            .into_iter()
            .collect();

        for pair in self.pending.lock().expect("pending lock poisoned").iter() {
            if !pair.key.starts_with(prefix) {
                continue;
            }
            if pair.delete {
                merged.remove(&pair.key);
            } else {
                merged.insert(pair.key.clone(), pair.value.clone());
            }
        }

        Box::new(merged.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sc::MemCommitmentEngine;

    fn engine() -> Arc<RwLock<Box<dyn CommitmentEngine>>> {
        let engine: Box<dyn CommitmentEngine> =
            Box::new(MemCommitmentEngine::init(&["bank".to_string()]));
        Arc::new(RwLock::new(engine))
    }

    #[test]
    fn test_pending_overrides_committed_reads() {
        let engine = engine();
        let mut store = CommitmentStore::new(engine.clone(), "bank");

        store.set(b"acct/1", b"100").unwrap();
        assert_eq!(store.get(b"acct/1").unwrap(), Some(b"100".to_vec()));

        store.delete(b"acct/1").unwrap();
        assert_eq!(store.get(b"acct/1").unwrap(), None);
    }

    #[test]
    fn test_pop_change_set_drains_and_resets() {
        let engine = engine();
        let mut store = CommitmentStore::new(engine, "bank");
        store.set(b"k1", b"v1").unwrap();
        store.set(b"k2", b"v2").unwrap();

        let cs = store.pop_change_set();
        assert_eq!(cs.pairs.len(), 2);

        let cs_again = store.pop_change_set();
        assert!(cs_again.is_empty());
    }

    #[test]
    fn test_prefix_iterator_overlays_pending() {
        let engine = engine();
        {
            let mut e = engine.write().unwrap();
            e.apply(&[crate::types::NamedChangeSet {
                name: "bank".to_string(),
                changeset: ChangeSet {
                    pairs: vec![KVPair {
                        key: b"acct/1".to_vec(),
                        value: b"100".to_vec(),
                        delete: false,
                    }],
                },
            }])
            .unwrap();
        }

        let mut store = CommitmentStore::new(engine, "bank");
        store.set(b"acct/2", b"200").unwrap();

        let all: Vec<_> = store.prefix_iterator(b"acct/").collect();
        assert_eq!(all.len(), 2);
    }
}
