//! The Pruning Manager: a background loop that deletes SS versions older
//! than a retention window.

use crate::ss::StateStorage;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

/// Owns the pruning background thread. Dropping without calling
/// `shutdown` leaves the thread running detached; prefer `shutdown` for
/// deterministic cleanup.
pub struct PruningManager {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PruningManager {
    /// Spawn the pruning loop: every `prune_interval_seconds`, if SS's
    /// latest version is `V` and `V - keep_recent > 0`, prune all SS
    /// versions `<= V - keep_recent`.
    pub fn spawn(
        ss: Arc<RwLock<dyn StateStorage>>,
        keep_recent: i64,
        prune_interval_seconds: i64,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = Duration::from_secs(prune_interval_seconds.max(0) as u64);

        let handle = std::thread::Builder::new()
            .name("ss-pruning".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        run_pruning_pass(&ss, keep_recent);
                    }
                }
            })
            .expect("failed to spawn pruning thread");

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the loop to stop after its current pass, and join it.
    pub fn shutdown(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PruningManager {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_pruning_pass(ss: &Arc<RwLock<dyn StateStorage>>, keep_recent: i64) {
    let latest = ss.read().expect("ss engine lock poisoned").latest_version();
    let cutoff = latest - keep_recent;
    if cutoff <= 0 {
        return;
    }
    tracing::debug!(latest, cutoff, "pruning pass");
    if let Err(err) = ss.write().expect("ss engine lock poisoned").prune(cutoff) {
        // Per spec §7, background-task errors are fatal, but pruning may
        // alternatively be logged and retried at the next interval; we
        // take that option rather than halting the process from inside a
        // detached thread with no supervisor to report to.
        tracing::warn!(?err, "pruning pass failed, will retry next interval");
    }
}
