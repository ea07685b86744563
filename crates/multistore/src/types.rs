//! Core data model: store keys, commit identities, and change sets.
//!
//! Mirrors spec section 3 verbatim: `StoreKey` identity semantics,
//! `CommitID`/`StoreInfo`/`CommitInfo` and the app-hash derivation, and the
//! change-set types that flow from a sub-store's write buffer through to
//! the SC and SS engines.

use crate::merkle;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// The closed set of sub-store kinds a `StoreKey` can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    /// Backed by the SC engine; contributes a `StoreInfo` and participates
    /// in the app hash.
    Authenticated,
    /// Non-persistent; reset at every commit; contributes no `StoreInfo`.
    Transient,
    /// Non-persistent; survives commits; contributes a placeholder `StoreInfo`.
    Memory,
}

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque store identity. Two `StoreKey`s are equal only if they are the
/// same object (identity, not name) — constructing a second key with the
/// same name is legal on its own, but mounting it alongside the first is
/// rejected by the root multi-store.
#[derive(Debug, Clone)]
pub struct StoreKey {
    id: u64,
    name: String,
    kind: StoreType,
}

impl StoreKey {
    /// Create a new store key with a fresh identity.
    pub fn new(name: impl Into<String>, kind: StoreType) -> Self {
        Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            kind,
        }
    }

    /// The store's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store's type.
    pub fn kind(&self) -> StoreType {
        self.kind
    }

    /// This key's identity, used by the root multi-store's mount table.
    /// Not part of the public equality contract (`PartialEq` already
    /// compares on it) — exposed so the root can key a map by identity
    /// without storing `StoreKey` itself.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for StoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for StoreKey {}

impl std::hash::Hash for StoreKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A (version, hash) pair identifying one committed state of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitID {
    pub version: i64,
    pub hash: Vec<u8>,
}

impl CommitID {
    /// The zero `CommitID`: version 0, empty hash.
    pub fn zero() -> Self {
        Self {
            version: 0,
            hash: Vec::new(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.version == 0 && self.hash.is_empty()
    }
}

impl Default for CommitID {
    fn default() -> Self {
        Self::zero()
    }
}

/// One mounted sub-store's name and committed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub name: String,
    pub commit_id: CommitID,
}

/// The version + per-store roots tuple the app hash is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub version: i64,
    pub store_infos: Vec<StoreInfo>,
}

impl CommitInfo {
    /// An empty commit info at version 0, used before the first load.
    pub fn empty() -> Self {
        Self {
            version: 0,
            store_infos: Vec::new(),
        }
    }

    /// This commit info's `CommitID`: its version paired with its app hash.
    pub fn commit_id(&self) -> CommitID {
        CommitID {
            version: self.version,
            hash: self.app_hash(),
        }
    }

    /// Sort `store_infos` lexicographically by name, as required before
    /// hashing (spec invariant: merged infos are sorted by name).
    pub fn sorted(mut self) -> Self {
        self.store_infos.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }

    /// Each `StoreInfo`'s leaf hash: `H(len(name) || name || store_hash)`.
    fn leaves(&self) -> Vec<[u8; 32]> {
        self.store_infos
            .iter()
            .map(|info| {
                let mut hasher = Sha256::new();
                hasher.update((info.name.len() as u32).to_be_bytes());
                hasher.update(info.name.as_bytes());
                hasher.update(&info.commit_id.hash);
                hasher.finalize().into()
            })
            .collect()
    }

    /// Deterministic Merkle root over the sorted `(name, hash)` leaves.
    /// Empty `store_infos` hashes to an empty byte vector, matching
    /// `CommitID::zero()`.
    pub fn app_hash(&self) -> Vec<u8> {
        if self.store_infos.is_empty() {
            return Vec::new();
        }
        merkle::fold(&self.leaves()).to_vec()
    }

    /// The Merkle path from `name`'s leaf up to the app hash, i.e. the
    /// "proof from the sub-store's root to the app hash" step described in
    /// the proof-composition design note. `store_infos` must already be
    /// sorted (see `sorted`).
    pub fn prove(&self, name: &str) -> Option<Vec<merkle::PathStep>> {
        let index = self.store_infos.iter().position(|i| i.name == name)?;
        merkle::path_for(&self.leaves(), index)
    }
}

/// A single write or delete within one sub-store's change set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KVPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub delete: bool,
}

/// The ordered batch of writes/deletes for one sub-store in one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub pairs: Vec<KVPair>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A `ChangeSet` attached to the name of the sub-store it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedChangeSet {
    pub name: String,
    pub changeset: ChangeSet,
}

/// All non-empty change sets produced by one commit, sorted by name, tagged
/// with the pre-commit version they were flushed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedChangeSets {
    pub version: i64,
    pub changesets: Vec<NamedChangeSet>,
}
