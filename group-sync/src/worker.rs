//! Background worker feeding transport changes into the engine
//!
//! The worker waits on the transport with a short timeout so it can notice
//! a stop request between changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::engine::SyncEngine;

/// Handle to a running sync worker
///
/// Dropping the handle stops the worker and waits for it to exit.
pub struct SyncWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<usize>>,
}

impl SyncWorker {
    /// Stop the worker and return how many changes it handled
    pub fn stop(mut self) -> usize {
        self.shutdown()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn shutdown(&mut self) -> usize {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(handled)) => handled,
            Some(Err(_)) => {
                tracing::error!("Sync worker panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns the sync worker thread
///
/// This worker:
/// - Waits for changes from the engine's transport
/// - Hands each one to `SyncEngine::handle_change`
/// - Exits once `SyncWorker::stop` is called or the handle is dropped
pub fn spawn_sync_worker(engine: Arc<SyncEngine>) -> SyncWorker {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    let handle = thread::spawn(move || {
        tracing::info!("Sync worker started, waiting for changes...");
        let poll = engine.config().worker_poll_interval;
        let transport = Arc::clone(&engine.collaborators().transport);
        let mut handled = 0;

        while !flag.load(Ordering::SeqCst) {
            if let Some(change) = transport.next_change_timeout(poll) {
                // Failures are logged by the engine
                let _ = engine.handle_change(change);
                handled += 1;
            }
        }

        tracing::info!("Sync worker stopped after {} changes", handled);
        handled
    });

    SyncWorker {
        stop,
        handle: Some(handle),
    }
}
