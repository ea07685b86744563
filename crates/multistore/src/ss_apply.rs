//! The SS Apply Loop: a background consumer thread that drains committed
//! change sets off the bounded pending channel and applies them to the SS
//! engine, decoupling the commit thread from SS write latency.

use crate::error::StoreError;
use crate::ss::StateStorage;
use crate::types::VersionedChangeSets;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

/// Owns the SS apply background thread. A fatal error encountered while
/// applying a change set is stashed rather than panicking the thread, so
/// the owner can observe it and decide whether to halt the process (spec
/// §7: apply-loop errors are fatal).
pub struct SsApplyLoop {
    handle: Option<JoinHandle<()>>,
    error: Arc<Mutex<Option<StoreError>>>,
}

impl SsApplyLoop {
    /// Spawn the loop. It runs until `rx` disconnects (the commit side
    /// drops its sender) or an apply fails.
    pub fn spawn(ss: Arc<RwLock<dyn StateStorage>>, rx: Receiver<VersionedChangeSets>) -> Self {
        let error = Arc::new(Mutex::new(None));
        let error_slot = error.clone();

        let handle = std::thread::Builder::new()
            .name("ss-apply".to_string())
            .spawn(move || {
                for batch in rx {
                    if let Err(err) = apply_batch(&ss, &batch) {
                        tracing::error!(?err, version = batch.version, "ss apply failed");
                        *error_slot.lock().expect("error slot poisoned") = Some(err);
                        break;
                    }
                }
            })
            .expect("failed to spawn ss apply thread");

        Self {
            handle: Some(handle),
            error,
        }
    }

    /// Take any fatal error recorded so far, if one occurred.
    pub fn take_error(&self) -> Option<StoreError> {
        self.error.lock().expect("error slot poisoned").take()
    }

    /// Block until the loop exits (the sender was dropped, or it hit a
    /// fatal error and stopped early).
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn apply_batch(
    ss: &Arc<RwLock<dyn StateStorage>>,
    batch: &VersionedChangeSets,
) -> crate::error::Result<()> {
    let mut guard = ss.write().expect("ss engine lock poisoned");
    for named in &batch.changesets {
        guard.apply_changeset(batch.version, named)?;
    }
    Ok(())
}
