//! The sub-store KV contract consumed by application code: get, set,
//! delete, ascending/reverse iteration, and has. Empty keys are rejected;
//! nil and empty values are distinguished by callers that care (the wire
//! layer) but normalized to empty on leaf import (see `snapshot`).

use crate::error::{Result, StoreError};

/// The read/write contract every sub-store exposes.
pub trait KVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
    fn delete(&mut self, key: &[u8]) -> Result<()>;

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Ascending iteration over all keys with the given prefix.
    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>;

    /// Descending iteration over all keys with the given prefix.
    fn reverse_prefix_iterator(
        &self,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let mut items: Vec<_> = self.prefix_iterator(prefix).collect();
        items.reverse();
        Box::new(items.into_iter())
    }
}

/// Validates that a key is non-empty, per the KV contract.
pub fn require_nonempty_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::Configuration("empty keys are rejected".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapStore(BTreeMap<Vec<u8>, Vec<u8>>);

    impl KVStore for MapStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self.0.get(key).cloned())
        }
        fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
            self.0.insert(key.to_vec(), value.to_vec());
            Ok(())
        }
        fn delete(&mut self, key: &[u8]) -> Result<()> {
            self.0.remove(key);
            Ok(())
        }
        fn prefix_iterator(
            &self,
            prefix: &[u8],
        ) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
            let prefix = prefix.to_vec();
            Box::new(
                self.0
                    .iter()
                    .filter(move |(k, _)| k.starts_with(&prefix))
                    .map(|(k, v)| (k.clone(), v.clone())),
            )
        }
    }

    #[test]
    fn test_reverse_iterator_default_impl() {
        let mut s = MapStore(BTreeMap::new());
        s.set(b"a", b"1").unwrap();
        s.set(b"b", b"2").unwrap();
        s.set(b"c", b"3").unwrap();

        let fwd: Vec<_> = s.prefix_iterator(b"").collect();
        let rev: Vec<_> = s.reverse_prefix_iterator(b"").collect();
        let mut fwd_reversed = fwd.clone();
        fwd_reversed.reverse();
        assert_eq!(rev, fwd_reversed);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(require_nonempty_key(b"").is_err());
        assert!(require_nonempty_key(b"x").is_ok());
    }
}
