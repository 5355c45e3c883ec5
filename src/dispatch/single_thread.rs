use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::unbounded;
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
use crate::constants::SINGLE_THREAD_WORKER_PREFIX;
use crate::CacheListener;
use crate::Cacheable;
use crate::DispatchError;
use crate::ListenerAdapter;
use crate::Notification;
use crate::Result;
use crate::SingleThreadConfig;

/// Handler run by a [`SerialWorker`] for every dequeued event
pub(crate) type SerialHandler<E> = Arc<dyn Fn(E) + Send + Sync>;

/// One unbounded FIFO queue consumed by exactly one worker thread
///
/// Enqueue never blocks. The worker keeps delivering after `stop()` until
/// the queue is empty, so events accepted before stop are not discarded.
pub(crate) struct SerialWorker<E>
where
    E: Send + 'static,
{
    name: String,
    thread_prefix: &'static str,
    lifecycle: LifecycleCell,
    sender: Sender<E>,
    receiver: Receiver<E>,
    shutdown_requested: Arc<AtomicBool>,
    workers: WorkerGroup,
    handler: SerialHandler<E>,
    config: SingleThreadConfig,
}

impl<E> SerialWorker<E>
where
    E: Send + 'static,
{
    pub(crate) fn new(
        name: String,
        thread_prefix: &'static str,
        config: SingleThreadConfig,
        handler: SerialHandler<E>,
    ) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            name,
            thread_prefix,
            lifecycle: LifecycleCell::new(),
            sender,
            receiver,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            workers: WorkerGroup::new(),
            handler,
            config,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn enqueue(
        &self,
        event: E,
    ) -> Result<()> {
        self.lifecycle.admit(&self.name, || {
            self.sender.send(event).map_err(|_| {
                DispatchError::QueueDisconnected {
                    dispatcher: self.name.clone(),
                }
                .into()
            })
        })
    }

    pub(crate) fn start(&self) -> Result<()> {
        self.lifecycle.start_with(&self.name, || self.spawn_worker())
    }

    fn spawn_worker(&self) -> Result<()> {
        let receiver = self.receiver.clone();
        let shutdown_requested = Arc::clone(&self.shutdown_requested);
        let handler = Arc::clone(&self.handler);
        let poll_interval = self.config.poll_interval();
        let name = self.name.clone();

        self.workers.spawn(
            &self.name,
            format!("{}-{}", self.thread_prefix, self.name),
            move || {
                debug!(dispatcher = %name, "Serial worker started");
                loop {
                    match receiver.recv_timeout(poll_interval) {
                        Ok(event) => handler(event),
                        Err(RecvTimeoutError::Timeout) => {
                            if shutdown_requested.load(Ordering::Acquire) && receiver.is_empty() {
                                break;
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            warn!(dispatcher = %name, "Serial queue closed unexpectedly");
                            break;
                        }
                    }
                }
                debug!(dispatcher = %name, "Serial worker stopped");
            },
        )
    }

    pub(crate) fn stop(&self) {
        if !self.lifecycle.begin_stop(&self.name) {
            return;
        }

        self.shutdown_requested.store(true, Ordering::Release);
        let timeout = self.config.shutdown_timeout();
        if !self.workers.wait_for_exit(timeout) {
            let e = DispatchError::ShutdownTimeout {
                dispatcher: self.name.clone(),
                waited: timeout,
                pending: self.receiver.len(),
            };
            warn!("{}", e);
        }
        self.lifecycle.finish_stop(&self.name);
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.receiver.len()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }
}

/// Serializes every notification for one listener onto one dedicated worker
///
/// Delivery order is exactly the order in which the cache produced the
/// notifications.
pub struct SingleThreadDispatcher<T>
where
    T: Cacheable,
{
    worker: SerialWorker<Notification<Arc<T>>>,
}

impl<T> SingleThreadDispatcher<T>
where
    T: Cacheable,
{
    pub fn new(
        name: impl Into<String>,
        adapter: ListenerAdapter<T>,
        config: SingleThreadConfig,
    ) -> Self {
        let name = name.into();
        let handler_name = name.clone();
        let handler: SerialHandler<Notification<Arc<T>>> = Arc::new(move |notification: Notification<Arc<T>>| {
            trace!(
                dispatcher = %handler_name,
                kind = %notification.kind,
                id = notification.entity_id(),
                "Delivering notification"
            );
            if let Err(e) = isolate(|| adapter.deliver(&notification)) {
                error!(
                    dispatcher = %handler_name,
                    kind = %notification.kind,
                    id = notification.entity_id(),
                    "Listener delivery failed: {}",
                    e
                );
            }
        });

        Self {
            worker: SerialWorker::new(name, SINGLE_THREAD_WORKER_PREFIX, config, handler),
        }
    }

    /// Queue a snapshot for the listener's `notify_element_updated`
    pub fn notify_element_updated(
        &self,
        entity: Arc<T>,
    ) -> Result<()> {
        self.worker.enqueue(Notification::update(entity))
    }

    /// Queue a snapshot for the listener's `confirm_status`
    pub fn confirm_status(
        &self,
        entity: Arc<T>,
    ) -> Result<()> {
        self.worker.enqueue(Notification::status_confirmation(entity))
    }
}

impl<T> CacheListener<T> for SingleThreadDispatcher<T>
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
        Some(self.worker.queue_size())
    }
}

impl<T> Lifecycle for SingleThreadDispatcher<T>
where
    T: Cacheable,
{
    fn name(&self) -> &str {
        self.worker.name()
    }

    fn start(&self) -> Result<()> {
        self.worker.start()
    }

    fn stop(&self) {
        self.worker.stop()
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn state(&self) -> LifecycleState {
        self.worker.state()
    }
}
