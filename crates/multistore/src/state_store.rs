//! The State Sub-Store: a thin read-only adapter pinning the SS engine to
//! a (store name, version) tuple. All writes fail with `ReadOnlyView`.

use crate::error::{Result, StoreError};
use crate::kv::{require_nonempty_key, KVStore};
use crate::ss::StateStorage;
use std::sync::{Arc, RwLock};

/// A read-only view over one sub-store at a fixed historical version,
/// served by the SS engine.
pub struct StateStore {
    ss: Arc<RwLock<dyn StateStorage>>,
    name: String,
    version: i64,
}

impl StateStore {
    pub fn new(ss: Arc<RwLock<dyn StateStorage>>, name: impl Into<String>, version: i64) -> Self {
        Self {
            ss,
            name: name.into(),
            version,
        }
    }

    pub fn version(&self) -> i64 {
        self.version
    }
}

impl KVStore for StateStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        require_nonempty_key(key)?;
        self.ss
            .read()
            .expect("ss engine lock poisoned")
            .get(&self.name, key, self.version)
    }

    fn set(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(StoreError::ReadOnlyView(format!(
            "store {} is a historical SS view pinned at version {}",
            self.name, self.version
        )))
    }

    fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(StoreError::ReadOnlyView(format!(
            "store {} is a historical SS view pinned at version {}",
            self.name, self.version
        )))
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let items = self
            .ss
            .read()
            .expect("ss engine lock poisoned")
            .prefix_iterator(&self.name, prefix, self.version)
            .unwrap_or_default();
        Box::new(items.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ss::MemStateStorage;
    use crate::types::{ChangeSet, KVPair, NamedChangeSet};

    #[test]
    fn test_writes_are_rejected() {
        let mut ss = MemStateStorage::new();
        ss.apply_changeset(
            1,
            &NamedChangeSet {
                name: "bank".into(),
                changeset: ChangeSet {
                    pairs: vec![KVPair {
                        key: b"k".to_vec(),
                        value: b"v".to_vec(),
                        delete: false,
                    }],
                },
            },
        )
        .unwrap();

        let mut view = StateStore::new(Arc::new(RwLock::new(ss)), "bank", 1);
        assert_eq!(view.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(matches!(
            view.set(b"k", b"v2"),
            Err(StoreError::ReadOnlyView(_))
        ));
        assert!(matches!(view.delete(b"k"), Err(StoreError::ReadOnlyView(_))));
    }
}
