//! Transient and Memory sub-stores: non-persistent KV variants.
//!
//! Both wrap a plain `BTreeMap`; the only difference between them is
//! mounting-table bookkeeping (whether they contribute a placeholder
//! `StoreInfo`) and whether the root clears them on commit. That
//! distinction lives in `root::RootMultiStore::commit`, not here.

use crate::error::Result;
use crate::kv::{require_nonempty_key, KVStore};
use std::collections::BTreeMap;

/// An in-memory KV store backing both Transient and Memory sub-stores.
#[derive(Default)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all contents. Called by the root on every commit for
    /// Transient sub-stores, and never for Memory sub-stores.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl KVStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        require_nonempty_key(key)?;
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        require_nonempty_key(key)?;
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        require_nonempty_key(key)?;
        self.data.remove(key);
        Ok(())
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let prefix = prefix.to_vec();
        Box::new(
            self.data
                .iter()
                .filter(move |(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_empties_store() {
        let mut s = MemStore::new();
        s.set(b"k", b"v").unwrap();
        assert!(s.get(b"k").unwrap().is_some());
        s.clear();
        assert!(s.get(b"k").unwrap().is_none());
    }
}
