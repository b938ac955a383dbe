use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, tick, Sender};
use crossbeam::select;

use super::Shared;

/// Handle to the background metadata sync worker.
///
/// The worker periodically persists the checkpoint so that a forgotten
/// `close` or a crash is less likely to trigger a recount at the next open.
/// The database does not depend on it for correctness, so sync failures are
/// only logged.
pub(super) struct SyncTask {
    shutdown: Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl SyncTask {
    /// Signals the worker to stop and waits for it.
    pub fn stop(self) {
        drop(self.shutdown);
        let _ = self.handle.join();
    }
}

pub(super) fn spawn(shared: Arc<Shared>) -> io::Result<SyncTask> {
    let (shutdown, shutdown_rx) = bounded::<()>(0);
    let ticker = tick(shared.config.sync_interval);

    let handle = thread::Builder::new()
        .name("sdb-sync".to_string())
        .spawn(move || loop {
            select! {
                recv(ticker) -> _ => {
                    if let Err(e) = shared.background_sync() {
                        tracing::warn!(error = %e, "background metadata sync failed");
                    }
                }
                recv(shutdown_rx) -> _ => return,
            }
        })?;

    Ok(SyncTask { shutdown, handle })
}
