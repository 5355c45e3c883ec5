use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::isolate;
use super::worker::WorkerGroup;
use super::Lifecycle;
use super::LifecycleCell;
use super::LifecycleState;
use crate::constants::POOL_WORKER_PREFIX;
use crate::CacheListener;
use crate::Cacheable;
use crate::DispatchError;
use crate::Error;
use crate::ListenerAdapter;
use crate::Notification;
use crate::Result;
use crate::ThreadPoolConfig;

/// Step used while `stop()` waits for the shared queue to empty
const DRAIN_CHECK_STEP: Duration = Duration::from_millis(5);

/// Spreads notifications for one listener across `N` worker threads
///
/// Enqueue blocks the cache-mutation thread while the shared bounded queue is
/// full. No ordering is guaranteed across workers, so only listeners whose
/// logic is order-insensitive should be pooled. The listener is shared by all
/// workers and must tolerate concurrent calls.
pub struct MultiThreadDispatcher<T>
where
    T: Cacheable,
{
    name: String,
    thread_count: usize,
    lifecycle: LifecycleCell,
    sender: Sender<Notification<Arc<T>>>,
    receiver: Receiver<Notification<Arc<T>>>,
    shutdown_requested: Arc<AtomicBool>,
    workers: WorkerGroup,
    adapter: Arc<ListenerAdapter<T>>,
    config: ThreadPoolConfig,
}

impl<T> MultiThreadDispatcher<T>
where
    T: Cacheable,
{
    pub fn new(
        name: impl Into<String>,
        adapter: ListenerAdapter<T>,
        thread_count: usize,
        config: ThreadPoolConfig,
    ) -> Result<Self> {
        let name = name.into();
        if thread_count == 0 {
            return Err(Error::InvalidConfig(format!(
                "dispatcher {name}: thread pool size must be greater than 0"
            )));
        }
        if config.queue_capacity == 0 {
            return Err(Error::InvalidConfig(format!(
                "dispatcher {name}: queue capacity must be greater than 0"
            )));
        }

        let (sender, receiver) = bounded(config.queue_capacity);
        Ok(Self {
            name,
            thread_count,
            lifecycle: LifecycleCell::new(),
            sender,
            receiver,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            workers: WorkerGroup::new(),
            adapter: Arc::new(adapter),
            config,
        })
    }

    /// Queue a snapshot for the listener's `notify_element_updated`,
    /// blocking while the task queue is full
    pub fn notify_element_updated(
        &self,
        entity: Arc<T>,
    ) -> Result<()> {
        self.enqueue(Notification::update(entity))
    }

    /// Queue a snapshot for the listener's `confirm_status`,
    /// blocking while the task queue is full
    pub fn confirm_status(
        &self,
        entity: Arc<T>,
    ) -> Result<()> {
        self.enqueue(Notification::status_confirmation(entity))
    }

    /// Capacity of the shared task queue
    pub fn queue_capacity(&self) -> usize {
        self.config.queue_capacity
    }

    /// Configured number of worker threads
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    fn enqueue(
        &self,
        task: Notification<Arc<T>>,
    ) -> Result<()> {
        self.lifecycle.admit(&self.name, || {
            self.sender.send(task).map_err(|_| {
                DispatchError::QueueDisconnected {
                    dispatcher: self.name.clone(),
                }
                .into()
            })
        })
    }

    fn worker_loop(
        name: &str,
        receiver: Receiver<Notification<Arc<T>>>,
        shutdown_requested: Arc<AtomicBool>,
        adapter: Arc<ListenerAdapter<T>>,
        poll_timeout: Duration,
    ) {
        loop {
            match receiver.recv_timeout(poll_timeout) {
                Ok(task) => {
                    trace!(dispatcher = %name, kind = %task.kind, id = task.entity_id(), "Delivering task");
                    if let Err(e) = isolate(|| adapter.deliver(&task)) {
                        error!(
                            dispatcher = %name,
                            kind = %task.kind,
                            id = task.entity_id(),
                            "Listener delivery failed: {}",
                            e
                        );
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if shutdown_requested.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(dispatcher = %name, "Task queue closed unexpectedly");
                    break;
                }
            }
        }
    }

    fn spawn_workers(&self) -> Result<()> {
        for index in 0..self.thread_count {
            let name = self.name.clone();
            let receiver = self.receiver.clone();
            let shutdown_requested = Arc::clone(&self.shutdown_requested);
            let adapter = Arc::clone(&self.adapter);
            let poll_timeout = self.config.poll_timeout();

            let spawned = self.workers.spawn(
                &self.name,
                format!("{}-{}-{}", POOL_WORKER_PREFIX, self.name, index),
                move || {
                    debug!(dispatcher = %name, worker = index, "Pool worker started");
                    Self::worker_loop(&name, receiver, shutdown_requested, adapter, poll_timeout);
                    debug!(dispatcher = %name, worker = index, "Pool worker stopped");
                },
            );

            if let Err(e) = spawned {
                // Let the workers already running drain and exit
                self.shutdown_requested.store(true, Ordering::Release);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Waits for the shared queue to empty, up to the configured bound
    fn wait_for_empty_queue(&self) -> bool {
        let deadline = Instant::now() + self.config.shutdown_timeout();
        while !self.receiver.is_empty() {
            if Instant::now() >= deadline || self.workers.alive() == 0 {
                return false;
            }
            std::thread::sleep(DRAIN_CHECK_STEP);
        }
        true
    }
}

impl<T> CacheListener<T> for MultiThreadDispatcher<T>
where
    T: Cacheable,
{
    fn on_update(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.notify_element_updated(Arc::clone(entity))
    }

    fn on_status_confirm(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.confirm_status(Arc::clone(entity))
    }

    fn task_queue_size(&self) -> Option<usize> {
        Some(self.receiver.len())
    }

    fn active_threads(&self) -> Option<usize> {
        Some(self.workers.alive())
    }
}

impl<T> Lifecycle for MultiThreadDispatcher<T>
where
    T: Cacheable,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        self.lifecycle.start_with(&self.name, || self.spawn_workers())
    }

    fn stop(&self) {
        if !self.lifecycle.begin_stop(&self.name) {
            return;
        }

        self.shutdown_requested.store(true, Ordering::Release);

        let drained = self.wait_for_empty_queue();
        let grace = self.config.shutdown_grace();
        let exited = self.workers.wait_for_exit(grace);

        if !drained || !exited {
            let waited = if drained {
                grace
            } else {
                self.config.shutdown_timeout() + grace
            };
            let e = DispatchError::ShutdownTimeout {
                dispatcher: self.name.clone(),
                waited,
                pending: self.receiver.len(),
            };
            warn!("{}", e);
        }
        self.lifecycle.finish_stop(&self.name);
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }
}
