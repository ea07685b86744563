//! Configuration surface for the multi-store: persisted-state layout,
//! SS enablement, channel capacities, and pruning parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a root multi-store instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiStoreConfig {
    /// Home directory under which the SC and SS engines each own a
    /// sub-directory. The root multi-store itself persists no state of
    /// its own (`last_commit_info` is reconstructed on load).
    pub home: PathBuf,

    /// Whether the SS engine is mounted. When `false`, historical queries
    /// fall back to the SC engine's historical-load path.
    pub enable_ss: bool,

    /// Capacity of the pending-change-set channel between the commit
    /// pipeline and the SS apply loop. Overflow blocks the commit thread.
    pub pending_changeset_capacity: usize,

    /// Capacity of the leaf-record channel used during snapshot restore.
    pub ss_import_capacity: usize,

    /// Number of most-recent SS versions retained by the pruning manager.
    pub keep_recent: i64,

    /// Seconds between pruning passes.
    pub prune_interval_seconds: i64,
}

impl Default for MultiStoreConfig {
    fn default() -> Self {
        Self {
            home: PathBuf::from("."),
            enable_ss: true,
            pending_changeset_capacity: 1000,
            ss_import_capacity: 10_000,
            keep_recent: 100,
            prune_interval_seconds: 600,
        }
    }
}

impl MultiStoreConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// any field the file omits.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn sc_dir(&self) -> PathBuf {
        self.home.join("sc")
    }

    pub fn ss_dir(&self) -> PathBuf {
        self.home.join("ss")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_spec_constants() {
        let cfg = MultiStoreConfig::default();
        assert_eq!(cfg.pending_changeset_capacity, 1000);
        assert_eq!(cfg.ss_import_capacity, 10_000);
    }

    #[test]
    fn test_from_toml_partial() {
        let cfg = MultiStoreConfig::from_toml_str(
            r#"
            home = "/var/lib/app"
            enable_ss = false
            pending_changeset_capacity = 1000
            ss_import_capacity = 10000
            keep_recent = 10
            prune_interval_seconds = 30
            "#,
        )
        .unwrap();
        assert_eq!(cfg.home, PathBuf::from("/var/lib/app"));
        assert!(!cfg.enable_ss);
        assert_eq!(cfg.keep_recent, 10);
    }

    #[test]
    fn test_sc_ss_dirs() {
        let cfg = MultiStoreConfig {
            home: PathBuf::from("/home/chain"),
            ..MultiStoreConfig::default()
        };
        assert_eq!(cfg.sc_dir(), PathBuf::from("/home/chain/sc"));
        assert_eq!(cfg.ss_dir(), PathBuf::from("/home/chain/ss"));
    }
}
