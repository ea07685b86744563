//! The Root Multi-Store: the mount table, commit pipeline, and query
//! router that tie every sub-store kind together into one versioned,
//! commit-hashing state machine.

use crate::commitment_store::CommitmentStore;
use crate::config::MultiStoreConfig;
use crate::error::{Result, StoreError};
use crate::kv::{require_nonempty_key, KVStore};
use crate::mem_store::MemStore;
use crate::pruning::PruningManager;
use crate::query::{leaf_hash, parse_path, Proof, QueryRequest, QueryResponse};
use crate::sc::CommitmentEngine;
use crate::ss::StateStorage;
use crate::ss_apply::SsApplyLoop;
use crate::state_store::StateStore;
use crate::types::{CommitInfo, NamedChangeSet, StoreKey, StoreType, VersionedChangeSets};
use crate::upgrades::Upgrades;
use std::collections::BTreeMap;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex, RwLock};

/// The largest version value `load_version`/`rollback` accept.
const MAX_VERSION: i64 = u32::MAX as i64;

enum MountKind {
    Authenticated(Arc<CommitmentStore>),
    /// Shared by Transient and Memory; the root decides clear-on-commit.
    Mem(Arc<Mutex<MemStore>>),
}

struct MountEntry {
    name: String,
    kind: StoreType,
    /// `None` until the first `load_version` call builds the handle; a
    /// store registered by `mount` alone cannot yet be read or written.
    store: Option<MountKind>,
}

/// A read view over one mounted sub-store as returned by
/// [`RootMultiStore::cache_multi_store`]: either the live handle, or (for
/// a historical, SS-backed authenticated view) a pinned read-only one.
pub enum CacheStoreHandle {
    Live(StoreHandle),
    Historical(StateStore),
}

impl KVStore for CacheStoreHandle {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            CacheStoreHandle::Live(handle) => handle.get(key),
            CacheStoreHandle::Historical(view) => view.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        match self {
            CacheStoreHandle::Live(handle) => handle.set(key, value),
            CacheStoreHandle::Historical(view) => view.set(key, value),
        }
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        match self {
            CacheStoreHandle::Live(handle) => handle.delete(key),
            CacheStoreHandle::Historical(view) => view.delete(key),
        }
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        match self {
            CacheStoreHandle::Live(handle) => handle.prefix_iterator(prefix),
            CacheStoreHandle::Historical(view) => view.prefix_iterator(prefix),
        }
    }
}

/// A handle to one mounted sub-store, implementing the common KV
/// contract regardless of which concrete kind backs it.
pub enum StoreHandle {
    Authenticated(Arc<CommitmentStore>),
    Mem(Arc<Mutex<MemStore>>),
}

impl KVStore for StoreHandle {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            StoreHandle::Authenticated(cs) => cs.get(key),
            StoreHandle::Mem(mem) => mem.lock().expect("mem store lock poisoned").get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        match self {
            StoreHandle::Authenticated(cs) => cs.push_set(key, value),
            StoreHandle::Mem(mem) => mem.lock().expect("mem store lock poisoned").set(key, value),
        }
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        match self {
            StoreHandle::Authenticated(cs) => cs.push_delete(key),
            StoreHandle::Mem(mem) => mem.lock().expect("mem store lock poisoned").delete(key),
        }
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        match self {
            StoreHandle::Authenticated(cs) => cs.prefix_iterator(prefix),
            StoreHandle::Mem(mem) => {
                let items: Vec<_> = mem
                    .lock()
                    .expect("mem store lock poisoned")
                    .prefix_iterator(prefix)
                    .collect();
                Box::new(items.into_iter())
            }
        }
    }
}

/// Composes every mounted sub-store under one monotonic version counter
/// and produces a single deterministic commitment hash per version.
pub struct RootMultiStore {
    sc: Arc<RwLock<Box<dyn CommitmentEngine>>>,
    ss: Option<Arc<RwLock<dyn StateStorage>>>,
    mounts: RwLock<BTreeMap<u64, MountEntry>>,
    last_commit_info: RwLock<CommitInfo>,
    config: MultiStoreConfig,
    pending_tx: Mutex<Option<SyncSender<VersionedChangeSets>>>,
    ss_apply: Mutex<Option<SsApplyLoop>>,
    pruning: Mutex<Option<PruningManager>>,
}

impl RootMultiStore {
    /// Construct an unloaded root over the given SC (and optional SS)
    /// engines. Call `mount` for every sub-store, then `load_version`
    /// before reading or writing.
    pub fn new(
        sc: Arc<RwLock<Box<dyn CommitmentEngine>>>,
        ss: Option<Arc<RwLock<dyn StateStorage>>>,
        config: MultiStoreConfig,
    ) -> Self {
        Self {
            sc,
            ss,
            mounts: RwLock::new(BTreeMap::new()),
            last_commit_info: RwLock::new(CommitInfo::empty()),
            config,
            pending_tx: Mutex::new(None),
            ss_apply: Mutex::new(None),
            pruning: Mutex::new(None),
        }
    }

    /// Register a sub-store. Mounting the same `StoreKey` object twice,
    /// or two different keys with the same name, is rejected.
    pub fn mount(&self, key: &StoreKey) -> Result<()> {
        let mut mounts = self.mounts.write().expect("mount table lock poisoned");
        if mounts.contains_key(&key.id()) {
            return Err(StoreError::Configuration(format!(
                "store key for {} is already mounted",
                key.name()
            )));
        }
        if mounts.values().any(|e| e.name == key.name()) {
            return Err(StoreError::Configuration(format!(
                "a store named {} is already mounted",
                key.name()
            )));
        }

        mounts.insert(
            key.id(),
            MountEntry {
                name: key.name().to_string(),
                kind: key.kind(),
                store: None,
            },
        );
        Ok(())
    }

    /// Fetch a read/write handle for a mounted store. Fails if
    /// `load_version` has not yet built this store's handle.
    pub fn get_store(&self, key: &StoreKey) -> Result<StoreHandle> {
        let mounts = self.mounts.read().expect("mount table lock poisoned");
        let entry = mounts
            .get(&key.id())
            .ok_or_else(|| StoreError::UnknownStore(key.name().to_string()))?;
        let store = entry.store.as_ref().ok_or_else(|| {
            StoreError::Configuration(format!(
                "store {} has not been loaded; call load_version first",
                entry.name
            ))
        })?;
        Ok(match store {
            MountKind::Authenticated(cs) => StoreHandle::Authenticated(cs.clone()),
            MountKind::Mem(mem) => StoreHandle::Mem(mem.clone()),
        })
    }

    /// Initialize the SC engine with the canonical name list of every
    /// mounted authenticated store, apply a schema change (add/delete/
    /// rename), and (re)build every mount handle. Expected to run once at
    /// startup, before the first commit of a new binary version.
    ///
    /// `version == 0` loads the latest committed version. Loading any
    /// other version as the live write head is rejected: doing so would
    /// require discarding every commit above it, which this crate treats
    /// as the separate, explicit `rollback` operation rather than an
    /// implicit side effect of loading a version.
    pub fn load_version(&self, version: i64, upgrades: &Upgrades) -> Result<()> {
        if version > MAX_VERSION {
            return Err(StoreError::VersionOverflow(version));
        }

        {
            let current = self.sc.read().expect("sc engine lock poisoned").current_version();
            let target = if version == 0 { current } else { version };
            if target != current {
                return Err(StoreError::Configuration(format!(
                    "cannot load version {target} as the write head: live engine is at {current}; use rollback to discard newer versions first"
                )));
            }
        }

        {
            let mut names: Vec<String> = self
                .mounts
                .read()
                .expect("mount table lock poisoned")
                .values()
                .filter(|e| e.kind == StoreType::Authenticated)
                .map(|e| e.name.clone())
                .collect();
            names.sort();

            let mut engine = self.sc.write().expect("sc engine lock poisoned");
            for name in &names {
                engine.add_tree(name)?;
            }
        }

        if !upgrades.is_empty() {
            let mut engine = self.sc.write().expect("sc engine lock poisoned");
            for name in &upgrades.deleted {
                engine.delete_tree(name)?;
            }
            for (new_name, old_name) in &upgrades.renames {
                engine.rename_tree(new_name, old_name)?;
            }
            for name in &upgrades.added {
                engine.add_tree(name)?;
            }
        }

        self.rebuild_authenticated_handles()?;
        self.ensure_mem_handles();

        let info = self.sc.read().expect("sc engine lock poisoned").committed_commit_info();
        let info = self.merge_with_memory_placeholders(info);
        *self.last_commit_info.write().expect("commit info lock poisoned") = info;

        if let Some(ss) = self.ss.clone() {
            let (tx, rx) = sync_channel(self.config.pending_changeset_capacity);
            *self.pending_tx.lock().expect("pending tx lock poisoned") = Some(tx);
            *self.ss_apply.lock().expect("ss apply lock poisoned") =
                Some(SsApplyLoop::spawn(ss.clone(), rx));
            *self.pruning.lock().expect("pruning lock poisoned") = Some(PruningManager::spawn(
                ss,
                self.config.keep_recent,
                self.config.prune_interval_seconds,
            ));
        }

        Ok(())
    }

    /// Append a `{version: 0, hash: empty}` `StoreInfo` for every mounted
    /// Memory store and re-sort. Memory stores contribute to the app hash
    /// as an inherited hashing convention even though they hold no
    /// authenticated tree of their own (spec.md §9, Memory-store
    /// placeholders); Transient stores contribute nothing.
    fn merge_with_memory_placeholders(&self, mut info: CommitInfo) -> CommitInfo {
        let mounts = self.mounts.read().expect("mount table lock poisoned");
        for entry in mounts.values() {
            if entry.kind == StoreType::Memory {
                info.store_infos.push(crate::types::StoreInfo {
                    name: entry.name.clone(),
                    commit_id: crate::types::CommitID::zero(),
                });
            }
        }
        info.sorted()
    }

    /// Drop and recreate every `CommitmentStore` wrapper so none carries
    /// a stale pending-write buffer across a schema change or reload.
    /// The underlying SC engine handle itself is unchanged (this crate's
    /// reference engine has no separate "swap tree handle" step). Fails
    /// with `MissingTree` if an authenticated mount's backing tree is
    /// absent after upgrades were applied.
    fn rebuild_authenticated_handles(&self) -> Result<()> {
        let mut mounts = self.mounts.write().expect("mount table lock poisoned");
        let sc = self.sc.read().expect("sc engine lock poisoned");
        for entry in mounts.values_mut() {
            if entry.kind == StoreType::Authenticated {
                if !sc.has_tree(&entry.name) {
                    return Err(StoreError::MissingTree(entry.name.clone()));
                }
                entry.store = Some(MountKind::Authenticated(Arc::new(CommitmentStore::new(
                    self.sc.clone(),
                    entry.name.clone(),
                ))));
            }
        }
        Ok(())
    }

    /// Build the Transient/Memory handle for every mount that doesn't yet
    /// have one. Unlike authenticated handles, these are created once and
    /// kept across commits (Transient content is cleared in `flush`, not
    /// recreated here).
    fn ensure_mem_handles(&self) {
        let mut mounts = self.mounts.write().expect("mount table lock poisoned");
        for entry in mounts.values_mut() {
            if entry.kind != StoreType::Authenticated && entry.store.is_none() {
                entry.store = Some(MountKind::Mem(Arc::new(Mutex::new(MemStore::new()))));
            }
        }
    }

    /// Drain every Authenticated sub-store's pending writes into the SC
    /// engine (without bumping the version) and clear Transient stores.
    /// Memory stores are left untouched.
    pub fn flush(&self) -> Result<VersionedChangeSets> {
        let mounts = self.mounts.read().expect("mount table lock poisoned");
        let mut changesets = Vec::new();
        for entry in mounts.values() {
            let store = entry
                .store
                .as_ref()
                .expect("store not yet loaded; call load_version before committing");
            match (&entry.kind, store) {
                (StoreType::Authenticated, MountKind::Authenticated(cs)) => {
                    let changeset = cs.pop_change_set();
                    if !changeset.is_empty() {
                        changesets.push(NamedChangeSet {
                            name: entry.name.clone(),
                            changeset,
                        });
                    }
                }
                (StoreType::Transient, MountKind::Mem(mem)) => {
                    mem.lock().expect("mem store lock poisoned").clear();
                }
                (StoreType::Memory, MountKind::Mem(_)) => {}
                _ => unreachable!("mount kind always matches its store type"),
            }
        }
        changesets.sort_by(|a, b| a.name.cmp(&b.name));

        let version = self.sc.read().expect("sc engine lock poisoned").current_version() + 1;
        self.sc
            .write()
            .expect("sc engine lock poisoned")
            .apply(&changesets)?;

        Ok(VersionedChangeSets { version, changesets })
    }

    /// Flush, bump the SC version, and hand the flushed change sets to
    /// the SS apply loop (if mounted). Returns the new `CommitInfo`.
    pub fn commit(&self) -> Result<CommitInfo> {
        let versioned = self.flush()?;
        let info = self.sc.write().expect("sc engine lock poisoned").commit()?;
        self.rebuild_authenticated_handles()?;
        let info = self.merge_with_memory_placeholders(info);
        *self.last_commit_info.write().expect("commit info lock poisoned") = info.clone();

        if !versioned.changesets.is_empty() {
            let tx = self.pending_tx.lock().expect("pending tx lock poisoned");
            if let Some(tx) = tx.as_ref() {
                tx.send(versioned).map_err(|_| {
                    StoreError::Internal("ss apply loop channel closed unexpectedly".into())
                })?;
            }
        }

        if let Some(apply) = self.ss_apply.lock().expect("ss apply lock poisoned").as_ref() {
            if let Some(err) = apply.take_error() {
                return Err(err);
            }
        }

        Ok(info)
    }

    /// Preview the app hash of the current working set without bumping
    /// the version. Flushes pending writes into the SC engine as a side
    /// effect (mirrors `commit`'s own flush step).
    pub fn working_hash(&self) -> Result<Vec<u8>> {
        self.flush()?;
        let info = self.sc.read().expect("sc engine lock poisoned").working_commit_info();
        Ok(self.merge_with_memory_placeholders(info).app_hash())
    }

    /// Discard every committed SC version strictly greater than `target`
    /// and reload handles. SS history (if mounted) is left untouched —
    /// it is an unauthenticated, best-effort index and has no rollback
    /// contract of its own.
    pub fn rollback(&self, target: i64) -> Result<()> {
        if target <= 0 || target > MAX_VERSION {
            return Err(StoreError::VersionOverflow(target));
        }
        self.sc.write().expect("sc engine lock poisoned").rollback(target)?;
        self.rebuild_authenticated_handles()?;
        let info = self.sc.read().expect("sc engine lock poisoned").committed_commit_info();
        let info = self.merge_with_memory_placeholders(info);
        *self.last_commit_info.write().expect("commit info lock poisoned") = info;
        Ok(())
    }

    /// Rebuild this root's SC engine (and SS content, if mounted) from a
    /// snapshot stream, literally swapping in the freshly imported engine
    /// — the "the mount table holds handles owned by the multi-store;
    /// each commit replaces the owned handles in-place" design note,
    /// applied to a restore instead of a commit. Every `StoreKey` the
    /// caller mounted before calling this must name a tree present in
    /// the snapshot.
    pub fn restore_from_snapshot(
        &self,
        items: Vec<crate::sc::SnapshotItem>,
        height: i64,
        importer: Box<dyn crate::sc::CommitmentImporter>,
    ) -> Result<()> {
        let restored = crate::snapshot::restore(
            items,
            height,
            importer,
            self.ss.as_ref(),
            self.config.ss_import_capacity,
        )?;
        *self.sc.write().expect("sc engine lock poisoned") = restored;
        self.rebuild_authenticated_handles()?;

        let info = self.sc.read().expect("sc engine lock poisoned").committed_commit_info();
        let info = self.merge_with_memory_placeholders(info);
        *self.last_commit_info.write().expect("commit info lock poisoned") = info;
        Ok(())
    }

    /// Close the SC engine, close the pending channel (terminating the SS
    /// apply loop cleanly), then close the SS engine. Every error
    /// encountered along the way is collected rather than short-circuiting
    /// on the first one, so a failure to close one engine doesn't prevent
    /// an attempt to close the other.
    pub fn close(&self) -> Vec<StoreError> {
        let mut errors = Vec::new();

        if let Err(err) = self.sc.write().expect("sc engine lock poisoned").close() {
            errors.push(err);
        }

        if let Some(apply) = self.ss_apply.lock().expect("ss apply lock poisoned").take() {
            drop(self.pending_tx.lock().expect("pending tx lock poisoned").take());
            apply.join();
        }
        if let Some(pruning) = self.pruning.lock().expect("pruning lock poisoned").take() {
            pruning.shutdown();
        }

        if let Some(ss) = &self.ss {
            if let Err(err) = ss.write().expect("ss engine lock poisoned").close() {
                errors.push(err);
            }
        }

        errors
    }

    pub fn last_commit_info(&self) -> CommitInfo {
        self.last_commit_info.read().expect("commit info lock poisoned").clone()
    }

    /// Route a query to the right engine: SC-latest when the requested
    /// height matches the last commit; otherwise SS (unauthenticated, no
    /// proof) when mounted and no proof was requested, since it's the
    /// cheaper historical path; otherwise SC-historical, which proofs
    /// always require.
    pub fn query(&self, req: QueryRequest) -> QueryResponse {
        let last_info = self.last_commit_info();
        let height = if req.height == 0 { last_info.version } else { req.height };
        match self.handle_query(&req, height, &last_info) {
            Ok(resp) => resp,
            Err(err) => QueryResponse::error(&err, height),
        }
    }

    fn handle_query(
        &self,
        req: &QueryRequest,
        height: i64,
        last_info: &CommitInfo,
    ) -> Result<QueryResponse> {
        let (store_name, sub_path) = parse_path(&req.path)?;
        if sub_path.is_empty() || sub_path == "/" {
            return Err(StoreError::UnknownRequest(format!(
                "missing key in query path: {}",
                req.path
            )));
        }
        let key = sub_path.trim_start_matches('/').as_bytes();
        require_nonempty_key(key)?;

        let mounts = self.mounts.read().expect("mount table lock poisoned");
        let entry = mounts
            .values()
            .find(|e| e.name == store_name)
            .ok_or_else(|| StoreError::UnknownStore(store_name.clone()))?;
        let store = entry
            .store
            .as_ref()
            .ok_or_else(|| StoreError::UnknownStore(store_name.clone()))?;

        match store {
            MountKind::Authenticated(cs) => {
                if height == last_info.version {
                    self.query_latest(cs, &store_name, key, req.prove, height, last_info)
                } else if !req.prove && self.ss.is_some() {
                    self.query_ss(&store_name, key, height)
                } else {
                    let hist = self.sc.read().expect("sc engine lock poisoned").load_historical(height)?;
                    self.query_historical(hist.as_ref(), &store_name, key, req.prove, height)
                }
            }
            MountKind::Mem(mem) => {
                if height != last_info.version {
                    return Err(StoreError::UnknownRequest(
                        "historical queries are not supported for non-authenticated stores".into(),
                    ));
                }
                let value = mem.lock().expect("mem store lock poisoned").get(key)?;
                Ok(QueryResponse::ok(value.unwrap_or_default(), height, None))
            }
        }
    }

    fn query_latest(
        &self,
        cs: &Arc<CommitmentStore>,
        store_name: &str,
        key: &[u8],
        prove: bool,
        height: i64,
        last_info: &CommitInfo,
    ) -> Result<QueryResponse> {
        if prove {
            let (value, store_path) = cs.get_with_proof(key)?;
            let commit_path = last_info.prove(store_name).unwrap_or_default();
            let proof = Proof { store_path, commit_path };
            if proof.is_empty() {
                return Err(StoreError::PrunedHeight(height));
            }
            Ok(QueryResponse::ok(value.unwrap_or_default(), height, Some(proof)))
        } else {
            let value = cs.get(key)?;
            Ok(QueryResponse::ok(value.unwrap_or_default(), height, None))
        }
    }

    fn query_historical(
        &self,
        hist: &dyn CommitmentEngine,
        store_name: &str,
        key: &[u8],
        prove: bool,
        height: i64,
    ) -> Result<QueryResponse> {
        if prove {
            let (value, store_path) = hist.get_with_proof(store_name, key)?;
            let info_at_height = hist.committed_commit_info();
            let commit_path = info_at_height.prove(store_name).unwrap_or_default();
            let proof = Proof { store_path, commit_path };
            if proof.is_empty() {
                return Err(StoreError::PrunedHeight(height));
            }
            Ok(QueryResponse::ok(value.unwrap_or_default(), height, Some(proof)))
        } else {
            let value = hist.get(store_name, key)?;
            Ok(QueryResponse::ok(value.unwrap_or_default(), height, None))
        }
    }

    fn query_ss(&self, store_name: &str, key: &[u8], height: i64) -> Result<QueryResponse> {
        let ss = self
            .ss
            .as_ref()
            .ok_or(StoreError::PrunedHeight(height))?
            .read()
            .expect("ss engine lock poisoned");
        let value = ss.get(store_name, key, height)?;
        Ok(QueryResponse::ok(value.unwrap_or_default(), height, None))
    }

    /// Construct a read-cache view over the mounted sub-store set. At the
    /// latest version (`version <= 0` or `version == last_commit_info().version`)
    /// this is a normal cache: every handle is live, identical to what
    /// `get_store` would return. At any other, earlier version,
    /// non-authenticated sub-stores are still served live (they hold no
    /// per-version history), while authenticated sub-stores are
    /// substituted with SS-backed read-only views pinned at that version,
    /// provided SS is mounted — without SS there is no historical index
    /// to substitute from, so the live handle is returned instead.
    pub fn cache_multi_store(&self, version: i64) -> Result<BTreeMap<String, CacheStoreHandle>> {
        let last_info = self.last_commit_info();
        let height = if version <= 0 { last_info.version } else { version };
        let historical = height != last_info.version;

        let mounts = self.mounts.read().expect("mount table lock poisoned");
        let mut views = BTreeMap::new();
        for entry in mounts.values() {
            let handle = if entry.kind == StoreType::Authenticated && historical {
                if let Some(ss) = &self.ss {
                    CacheStoreHandle::Historical(StateStore::new(ss.clone(), entry.name.clone(), height))
                } else {
                    CacheStoreHandle::Live(self.live_handle(entry)?)
                }
            } else {
                CacheStoreHandle::Live(self.live_handle(entry)?)
            };
            views.insert(entry.name.clone(), handle);
        }
        Ok(views)
    }

    fn live_handle(&self, entry: &MountEntry) -> Result<StoreHandle> {
        let store = entry.store.as_ref().ok_or_else(|| {
            StoreError::Configuration(format!("store {} has not been loaded", entry.name))
        })?;
        Ok(match store {
            MountKind::Authenticated(cs) => StoreHandle::Authenticated(cs.clone()),
            MountKind::Mem(mem) => StoreHandle::Mem(mem.clone()),
        })
    }
}

/// Recompute `leaf_hash(key, value)` and verify it against a proof's
/// store/commit path chain. A thin convenience so callers don't need to
/// reach into `query` directly.
pub fn verify_membership(proof: &Proof, key: &[u8], value: &[u8], app_hash: &[u8]) -> bool {
    proof.verify(leaf_hash(key, value), app_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sc::MemCommitmentEngine;
    use crate::ss::MemStateStorage;
    use crate::types::StoreType;

    fn fresh_root() -> RootMultiStore {
        let sc: Arc<RwLock<Box<dyn CommitmentEngine>>> = {
            let engine: Box<dyn CommitmentEngine> = Box::new(MemCommitmentEngine::init(&[]));
            Arc::new(RwLock::new(engine))
        };
        RootMultiStore::new(sc, None, MultiStoreConfig::default())
    }

    #[test]
    fn test_mount_and_commit_single_store() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();

        {
            let mut store = root.get_store(&bank).unwrap();
            store.set(b"acct/1", b"100").unwrap();
        }
        let info = root.commit().unwrap();
        assert_eq!(info.version, 1);
        assert!(!info.app_hash().is_empty());

        let store = root.get_store(&bank).unwrap();
        assert_eq!(store.get(b"acct/1").unwrap(), Some(b"100".to_vec()));
    }

    #[test]
    fn test_commit_hash_independent_of_mount_order() {
        let sc_a: Arc<RwLock<Box<dyn CommitmentEngine>>> = {
            let engine: Box<dyn CommitmentEngine> = Box::new(MemCommitmentEngine::init(&[]));
            Arc::new(RwLock::new(engine))
        };
        let root_a = RootMultiStore::new(sc_a, None, MultiStoreConfig::default());
        let a1 = StoreKey::new("a", StoreType::Authenticated);
        let b1 = StoreKey::new("b", StoreType::Authenticated);
        root_a.mount(&a1).unwrap();
        root_a.mount(&b1).unwrap();
        root_a.load_version(0, &Upgrades::default()).unwrap();
        root_a.get_store(&a1).unwrap().set(b"k", b"v").unwrap();
        root_a.get_store(&b1).unwrap().set(b"k", b"v").unwrap();
        let info_a = root_a.commit().unwrap();

        let sc_b: Arc<RwLock<Box<dyn CommitmentEngine>>> = {
            let engine: Box<dyn CommitmentEngine> = Box::new(MemCommitmentEngine::init(&[]));
            Arc::new(RwLock::new(engine))
        };
        let root_b = RootMultiStore::new(sc_b, None, MultiStoreConfig::default());
        let b2 = StoreKey::new("b", StoreType::Authenticated);
        let a2 = StoreKey::new("a", StoreType::Authenticated);
        root_b.mount(&b2).unwrap();
        root_b.mount(&a2).unwrap();
        root_b.load_version(0, &Upgrades::default()).unwrap();
        root_b.get_store(&b2).unwrap().set(b"k", b"v").unwrap();
        root_b.get_store(&a2).unwrap().set(b"k", b"v").unwrap();
        let info_b = root_b.commit().unwrap();

        assert_eq!(info_a.app_hash(), info_b.app_hash());
    }

    #[test]
    fn test_duplicate_mount_rejected() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        assert!(root.mount(&bank).is_err());

        let bank2 = StoreKey::new("bank", StoreType::Authenticated);
        assert!(root.mount(&bank2).is_err());
    }

    #[test]
    fn test_query_latest_with_proof_verifies() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();
        root.get_store(&bank).unwrap().set(b"acct/1", b"100").unwrap();
        let info = root.commit().unwrap();

        let resp = root.query(QueryRequest {
            path: "/bank/acct/1".into(),
            data: Vec::new(),
            height: 0,
            prove: true,
        });
        assert_eq!(resp.value, b"100");
        let proof = resp.proof.unwrap();
        assert!(verify_membership(&proof, b"acct/1", b"100", &info.app_hash()));
    }

    #[test]
    fn test_historical_query_after_second_commit() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();

        root.get_store(&bank).unwrap().set(b"k", b"v1").unwrap();
        root.commit().unwrap();
        root.get_store(&bank).unwrap().set(b"k", b"v2").unwrap();
        root.commit().unwrap();

        let resp = root.query(QueryRequest {
            path: "/bank/k".into(),
            data: Vec::new(),
            height: 1,
            prove: false,
        });
        assert_eq!(resp.value, b"v1");

        let latest = root.query(QueryRequest {
            path: "/bank/k".into(),
            data: Vec::new(),
            height: 0,
            prove: false,
        });
        assert_eq!(latest.value, b"v2");
    }

    #[test]
    fn test_ss_mounted_root_closes_cleanly() {
        let sc: Arc<RwLock<Box<dyn CommitmentEngine>>> = {
            let engine: Box<dyn CommitmentEngine> = Box::new(MemCommitmentEngine::init(&[]));
            Arc::new(RwLock::new(engine))
        };
        let ss: Arc<RwLock<dyn StateStorage>> = Arc::new(RwLock::new(MemStateStorage::new()));
        let root = RootMultiStore::new(
            sc,
            Some(ss),
            MultiStoreConfig {
                prune_interval_seconds: 3600,
                ..MultiStoreConfig::default()
            },
        );
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();

        root.get_store(&bank).unwrap().set(b"k", b"v1").unwrap();
        root.commit().unwrap();
        root.close();

        let resp = root.query(QueryRequest {
            path: "/bank/k".into(),
            data: Vec::new(),
            height: 1,
            prove: false,
        });
        assert_eq!(resp.value, b"v1");
    }

    #[test]
    fn test_rollback_discards_later_versions() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();

        root.get_store(&bank).unwrap().set(b"k", b"v1").unwrap();
        root.commit().unwrap();
        root.get_store(&bank).unwrap().set(b"k", b"v2").unwrap();
        root.commit().unwrap();

        root.rollback(1).unwrap();
        assert_eq!(root.last_commit_info().version, 1);
        assert_eq!(
            root.get_store(&bank).unwrap().get(b"k").unwrap(),
            Some(b"v1".to_vec())
        );
    }

    #[test]
    fn test_rollback_rejects_out_of_range_targets() {
        let root = fresh_root();
        assert!(matches!(root.rollback(0), Err(StoreError::VersionOverflow(0))));
        assert!(matches!(root.rollback(-1), Err(StoreError::VersionOverflow(-1))));
        assert!(matches!(
            root.rollback(i64::from(u32::MAX) + 1),
            Err(StoreError::VersionOverflow(_))
        ));
    }

    #[test]
    fn test_load_version_rejects_overflowing_target() {
        let root = fresh_root();
        let result = root.load_version(i64::from(u32::MAX) + 1, &Upgrades::default());
        assert!(matches!(result, Err(StoreError::VersionOverflow(_))));
    }

    #[test]
    fn test_rebuild_fails_with_missing_tree_after_bad_rename() {
        let root = fresh_root();
        let old = StoreKey::new("old", StoreType::Authenticated);
        root.mount(&old).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();
        root.get_store(&old).unwrap().set(b"k", b"v").unwrap();
        root.commit().unwrap();

        // A mount whose backing tree vanishes out from under it (e.g. an
        // upgrade that deleted it without a matching rename) must fail
        // closed rather than construct a handle over nothing.
        root.sc.write().unwrap().delete_tree("old").unwrap();
        assert!(matches!(
            root.rebuild_authenticated_handles(),
            Err(StoreError::MissingTree(name)) if name == "old"
        ));
    }

    #[test]
    fn test_cache_multi_store_latest_is_live() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();
        root.get_store(&bank).unwrap().set(b"k", b"v1").unwrap();
        root.commit().unwrap();

        let mut views = root.cache_multi_store(0).unwrap();
        let view = views.get_mut("bank").unwrap();
        assert_eq!(view.get(b"k").unwrap(), Some(b"v1".to_vec()));
    }

    #[test]
    fn test_cache_multi_store_historical_uses_ss() {
        let sc: Arc<RwLock<Box<dyn CommitmentEngine>>> = {
            let engine: Box<dyn CommitmentEngine> = Box::new(MemCommitmentEngine::init(&[]));
            Arc::new(RwLock::new(engine))
        };
        let ss: Arc<RwLock<dyn StateStorage>> = Arc::new(RwLock::new(MemStateStorage::new()));
        let root = RootMultiStore::new(
            sc,
            Some(ss),
            MultiStoreConfig {
                prune_interval_seconds: 3600,
                ..MultiStoreConfig::default()
            },
        );
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();

        root.get_store(&bank).unwrap().set(b"k", b"v1").unwrap();
        root.commit().unwrap();
        root.get_store(&bank).unwrap().set(b"k", b"v2").unwrap();
        root.commit().unwrap();

        let mut views = root.cache_multi_store(1).unwrap();
        let view = views.get_mut("bank").unwrap();
        assert_eq!(view.get(b"k").unwrap(), Some(b"v1".to_vec()));
        assert!(matches!(view.set(b"k", b"v3"), Err(StoreError::ReadOnlyView(_))));
        root.close();
    }

    #[test]
    fn test_close_aggregates_no_errors_when_clean() {
        let root = fresh_root();
        let bank = StoreKey::new("bank", StoreType::Authenticated);
        root.mount(&bank).unwrap();
        root.load_version(0, &Upgrades::default()).unwrap();
        assert!(root.close().is_empty());
    }
}
