//! A versioned, commit-hashing root multi-store: the state layer of a
//! blockchain application.
//!
//! Two engines back every mounted sub-store: the State-Commitment (SC)
//! engine, an authenticated, versioned Merkle tree that produces the
//! per-version app hash and inclusion proofs; and the optional
//! State-Storage (SS) engine, an unauthenticated, pruned key-value index
//! used for cheap historical reads once SC has pruned the same height.
//! [`root::RootMultiStore`] composes both behind one mount table, one
//! monotonic version counter, and one commit pipeline.

pub mod commitment_store;
pub mod config;
pub mod error;
pub mod kv;
pub mod mem_store;
pub mod merkle;
pub mod pruning;
pub mod query;
pub mod root;
pub mod sc;
pub mod snapshot;
pub mod ss;
pub mod ss_apply;
pub mod state_store;
pub mod types;
pub mod upgrades;

pub use commitment_store::CommitmentStore;
pub use config::MultiStoreConfig;
pub use error::{Result, StoreError};
pub use kv::KVStore;
pub use query::{QueryRequest, QueryResponse};
pub use root::RootMultiStore;
pub use sc::{CommitmentEngine, CommitmentImporter, MemCommitmentEngine, MemCommitmentImporter};
pub use ss::{MemStateStorage, StateStorage};
pub use state_store::StateStore;
pub use types::{
    ChangeSet, CommitID, CommitInfo, KVPair, NamedChangeSet, StoreInfo, StoreKey, StoreType,
    VersionedChangeSets,
};
pub use upgrades::Upgrades;
