//! The Snapshot Driver: streamed export of a committed height and
//! restore of a fresh multi-store from that stream.
//!
//! The wire framing of a snapshot (chunking, compression, the ABCI
//! snapshot RPCs) is out of scope; this module works directly with the
//! in-process `SnapshotItem` stream produced by `sc::CommitmentEngine::export`.
//! A transport adapter would sit between this module and the network.

use crate::error::{Result, StoreError};
use crate::sc::{CommitmentEngine, CommitmentImporter, SnapshotItem};
use crate::ss::{LeafRecord, StateStorage};
use std::sync::mpsc::sync_channel;
use std::sync::{Arc, RwLock};

/// Export the full node stream for `height`. A thin pass-through over the
/// SC engine's own export, kept as the single call site a transport
/// adapter would wrap.
pub fn export(engine: &dyn CommitmentEngine, height: i64) -> Result<Vec<SnapshotItem>> {
    engine.export(height)
}

/// Construct an `Iavl` item from wire-width integers, narrowing `height`
/// to the `i8` the in-process representation uses. This is the boundary
/// at which a real transport's height field (often a wider int) must be
/// validated; nothing in this crate produces an out-of-range height on
/// its own.
pub fn make_iavl_item(
    key: Vec<u8>,
    value: Vec<u8>,
    height: i64,
    version: i64,
) -> Result<SnapshotItem> {
    let height: i8 = height
        .try_into()
        .map_err(|_| StoreError::NodeHeightOverflow(height))?;
    Ok(SnapshotItem::Iavl {
        key,
        value,
        height,
        version,
    })
}

/// Rebuild a `CommitmentEngine` (and, if `ss` is given, replace its
/// contents) from `items`, an export stream for `height`.
///
/// Leaf records (`height == 0`) are mirrored to the SS engine as they are
/// read, bounded by an `ss_import_capacity`-sized channel so the SS side
/// never lags the SC side by more than that many records — the "lock-step"
/// the two importers run in. The SS side is buffered rather than applied
/// live: restore only replaces the running SS engine once the SC importer
/// has finalized successfully, so a failed restore leaves both engines
/// untouched.
pub fn restore(
    items: Vec<SnapshotItem>,
    height: i64,
    mut sc_importer: Box<dyn CommitmentImporter>,
    ss: Option<&Arc<RwLock<dyn StateStorage>>>,
    ss_import_capacity: usize,
) -> Result<Box<dyn CommitmentEngine>> {
    let (leaf_tx, leaf_rx) = sync_channel::<LeafRecord>(ss_import_capacity.max(1));

    let collector = ss.is_some().then(|| {
        std::thread::Builder::new()
            .name("ss-restore-collect".to_string())
            .spawn(move || leaf_rx.into_iter().collect::<Vec<_>>())
            .expect("failed to spawn ss restore collector")
    });

    let mut current_store: Option<String> = None;
    let mut failure: Option<StoreError> = None;

    for item in items {
        match item {
            SnapshotItem::Store { name } => {
                if let Err(err) = sc_importer.add_tree(&name) {
                    failure = Some(err);
                    break;
                }
                current_store = Some(name);
            }
            SnapshotItem::Iavl {
                key,
                value,
                height,
                version: _,
            } => {
                let Some(store) = current_store.clone() else {
                    failure = Some(StoreError::Configuration(
                        "snapshot item stream out of order: leaf before store header".into(),
                    ));
                    break;
                };
                // A `nil` key in the original node representation has no
                // distinct Rust form: `Vec::new()` already is the
                // normalized empty key, so there is nothing to do here.
                if height == 0 {
                    if leaf_tx
                        .send(LeafRecord {
                            store: store.clone(),
                            key: key.clone(),
                            value: value.clone(),
                        })
                        .is_err()
                    {
                        // Collector thread is gone (ss == None): fine, SC
                        // import still proceeds on its own.
                    }
                }
                if let Err(err) = sc_importer.add_leaf(&store, key, value) {
                    failure = Some(err);
                    break;
                }
            }
        }
    }
    drop(leaf_tx);

    let collected = collector.map(|handle| handle.join().expect("ss restore collector panicked"));

    if let Some(err) = failure {
        return Err(err);
    }

    let engine = sc_importer.finalize(height)?;

    if let (Some(ss), Some(records)) = (ss, collected) {
        let (tx, rx) = sync_channel(records.len().max(1));
        for record in records {
            tx.send(record).expect("unbounded replay channel");
        }
        drop(tx);
        ss.write()
            .expect("ss engine lock poisoned")
            .import(height, rx)?;
    }

    Ok(engine)
}
