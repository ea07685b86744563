//! The upgrades descriptor: a schema change (add/delete/rename of
//! sub-stores) applied atomically at the version boundary preceding the
//! first commit after startup.

use std::collections::{BTreeMap, BTreeSet};

/// `added`/`deleted` name new or removed authenticated trees; `renames`
/// maps a new name to the old name it should inherit contents from.
#[derive(Debug, Clone, Default)]
pub struct Upgrades {
    pub added: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    /// new_name -> old_name
    pub renames: BTreeMap<String, String>,
}

impl Upgrades {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.renames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_upgrades() {
        assert!(Upgrades::default().is_empty());
    }

    #[test]
    fn test_nonempty_upgrades() {
        let mut u = Upgrades::default();
        u.added.insert("b".to_string());
        assert!(!u.is_empty());
    }
}
