use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::trace;

use crate::DispatchError;
use crate::Result;

/// Decrements the alive count and signals exit even if the worker unwinds
struct ExitGuard {
    alive: Arc<AtomicUsize>,
    exited: Sender<()>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::AcqRel);
        let _ = self.exited.send(());
    }
}

/// The OS threads owned by one dispatcher
///
/// `std::thread::JoinHandle` cannot be joined with a deadline, so each worker
/// reports its exit on a channel and `wait_for_exit` only joins once every
/// worker has reported.
pub(crate) struct WorkerGroup {
    handles: Mutex<Vec<JoinHandle<()>>>,
    alive: Arc<AtomicUsize>,
    exited_tx: Sender<()>,
    exited_rx: Receiver<()>,
}

impl WorkerGroup {
    pub(crate) fn new() -> Self {
        let (exited_tx, exited_rx) = unbounded();
        Self {
            handles: Mutex::new(Vec::new()),
            alive: Arc::new(AtomicUsize::new(0)),
            exited_tx,
            exited_rx,
        }
    }

    pub(crate) fn spawn<F>(
        &self,
        dispatcher: &str,
        thread_name: String,
        body: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.alive.fetch_add(1, Ordering::AcqRel);
        let guard = ExitGuard {
            alive: Arc::clone(&self.alive),
            exited: self.exited_tx.clone(),
        };

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let _guard = guard;
                trace!(thread = %thread_name, "Worker thread running");
                body();
            })
            .map_err(|source| DispatchError::WorkerSpawn {
                dispatcher: dispatcher.to_string(),
                source,
            })?;

        self.handles.lock().push(handle);
        Ok(())
    }

    /// Worker threads that have not exited yet
    pub(crate) fn alive(&self) -> usize {
        self.alive.load(Ordering::Acquire)
    }

    /// Waits up to `timeout` for every worker to exit, then joins them
    ///
    /// Returns `false` when the bound expired; workers still running are left
    /// detached and are never interrupted.
    pub(crate) fn wait_for_exit(
        &self,
        timeout: Duration,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while self.alive() > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let _ = self.exited_rx.recv_timeout(deadline - now);
        }

        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
        true
    }
}
