use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
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
use crate::constants::BUFFERED_WORKER_PREFIX;
use crate::BufferedConfig;
use crate::BulkAdapter;
use crate::CacheListener;
use crate::Cacheable;
use crate::DispatchError;
use crate::Error;
use crate::NotificationKind;
use crate::Result;

/// Receiving ends of the per-kind queues, owned by the flush worker
struct FlushQueues<S> {
    updates: Receiver<S>,
    confirmations: Receiver<S>,
}

impl<S> FlushQueues<S> {
    fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.confirmations.is_empty()
    }
}

/// Accumulates projections in two unbounded queues (updates, status
/// confirmations) and hands them to a bulk listener once per period
///
/// Each cycle drains at most `drain_cap` projections per queue, preserving
/// enqueue order within a queue. After `stop()` the worker keeps flushing
/// until both queues are empty.
pub struct BufferedDispatcher<T, S>
where
    T: Cacheable,
    S: Send + 'static,
{
    name: String,
    period: Duration,
    lifecycle: LifecycleCell,
    running: Arc<AtomicBool>,
    update_tx: Sender<S>,
    confirmation_tx: Sender<S>,
    queues: Arc<FlushQueues<S>>,
    workers: WorkerGroup,
    adapter: Arc<BulkAdapter<T, S>>,
    config: BufferedConfig,
}

impl<T, S> BufferedDispatcher<T, S>
where
    T: Cacheable,
    S: Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        adapter: BulkAdapter<T, S>,
        period: Duration,
        config: BufferedConfig,
    ) -> Result<Self> {
        let name = name.into();
        if period.is_zero() {
            return Err(Error::InvalidConfig(format!(
                "dispatcher {name}: flush period must be greater than 0"
            )));
        }
        if config.drain_cap == 0 {
            return Err(Error::InvalidConfig(format!(
                "dispatcher {name}: drain cap must be greater than 0"
            )));
        }

        let (update_tx, updates) = unbounded();
        let (confirmation_tx, confirmations) = unbounded();
        Ok(Self {
            name,
            period,
            lifecycle: LifecycleCell::new(),
            running: Arc::new(AtomicBool::new(false)),
            update_tx,
            confirmation_tx,
            queues: Arc::new(FlushQueues { updates, confirmations }),
            workers: WorkerGroup::new(),
            adapter: Arc::new(adapter),
            config,
        })
    }

    /// Project the entity and queue it for the next update flush
    pub fn notify_element_updated(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.enqueue(NotificationKind::Update, entity)
    }

    /// Project the entity and queue it for the next status-confirmation flush
    pub fn confirm_status(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.enqueue(NotificationKind::StatusConfirmation, entity)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// True while the flush worker thread is alive
    pub fn is_flushing(&self) -> bool {
        self.workers.alive() > 0
    }

    /// Projections queued per kind, `(updates, confirmations)`
    pub fn pending(&self) -> (usize, usize) {
        (self.queues.updates.len(), self.queues.confirmations.len())
    }

    fn enqueue(
        &self,
        kind: NotificationKind,
        entity: &Arc<T>,
    ) -> Result<()> {
        let sender = match kind {
            NotificationKind::Update => &self.update_tx,
            NotificationKind::StatusConfirmation => &self.confirmation_tx,
        };
        self.lifecycle.ensure_running(&self.name)?;
        let projection = self.adapter.project(entity);
        self.lifecycle.admit(&self.name, || {
            sender.send(projection).map_err(|_| {
                DispatchError::QueueDisconnected {
                    dispatcher: self.name.clone(),
                }
                .into()
            })
        })
    }

    fn spawn_flush_worker(&self) -> Result<()> {
        self.running.store(true, Ordering::Release);

        let name = self.name.clone();
        let queues = Arc::clone(&self.queues);
        let adapter = Arc::clone(&self.adapter);
        let running = Arc::clone(&self.running);
        let period = self.period;
        let config = self.config.clone();

        let spawned = self.workers.spawn(
            &self.name,
            format!("{}-{}", BUFFERED_WORKER_PREFIX, self.name),
            move || {
                debug!(dispatcher = %name, ?period, "Flush worker started");
                Self::flush_loop(&name, &queues, &adapter, &running, period, &config);
                debug!(dispatcher = %name, "Flush worker stopped");
            },
        );

        if spawned.is_err() {
            self.running.store(false, Ordering::Release);
        }
        spawned
    }

    fn flush_loop(
        name: &str,
        queues: &FlushQueues<S>,
        adapter: &BulkAdapter<T, S>,
        running: &AtomicBool,
        period: Duration,
        config: &BufferedConfig,
    ) {
        // first flush happens one full period after start
        wait_out_period(Instant::now(), period, config.sleep_granularity(), running);

        loop {
            let cycle_start = Instant::now();

            let updates = drain(&queues.updates, config.drain_cap);
            let confirmations = drain(&queues.confirmations, config.drain_cap);
            Self::flush(name, adapter, NotificationKind::Update, updates);
            Self::flush(name, adapter, NotificationKind::StatusConfirmation, confirmations);

            if !running.load(Ordering::Acquire) && queues.is_empty() {
                break;
            }
            if running.load(Ordering::Acquire) {
                wait_out_period(cycle_start, period, config.sleep_granularity(), running);
            }
        }
    }

    fn flush(
        name: &str,
        adapter: &BulkAdapter<T, S>,
        kind: NotificationKind,
        batch: Vec<S>,
    ) {
        if batch.is_empty() {
            return;
        }
        trace!(dispatcher = %name, kind = %kind, size = batch.len(), "Flushing batch");
        if let Err(e) = isolate(|| adapter.deliver_batch(kind, &batch)) {
            error!(
                dispatcher = %name,
                kind = %kind,
                size = batch.len(),
                "Bulk listener delivery failed: {}",
                e
            );
        }
    }
}

/// Takes up to `cap` queued items, oldest first
fn drain<S>(
    queue: &Receiver<S>,
    cap: usize,
) -> Vec<S> {
    let mut batch = Vec::with_capacity(cap.min(queue.len()));
    while batch.len() < cap {
        match queue.try_recv() {
            Ok(item) => batch.push(item),
            Err(_) => break,
        }
    }
    batch
}

/// Sleeps in `granularity` steps until `period` has elapsed since
/// `cycle_start`; returns early once `running` is cleared
fn wait_out_period(
    cycle_start: Instant,
    period: Duration,
    granularity: Duration,
    running: &AtomicBool,
) {
    let deadline = cycle_start + period;
    loop {
        let now = Instant::now();
        if now >= deadline || !running.load(Ordering::Acquire) {
            return;
        }
        std::thread::sleep(granularity.min(deadline - now));
    }
}

impl<T, S> CacheListener<T> for BufferedDispatcher<T, S>
where
    T: Cacheable,
    S: Send + 'static,
{
    fn on_update(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.notify_element_updated(entity)
    }

    fn on_status_confirm(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.confirm_status(entity)
    }

    fn task_queue_size(&self) -> Option<usize> {
        let (updates, confirmations) = self.pending();
        Some(updates + confirmations)
    }
}

impl<T, S> Lifecycle for BufferedDispatcher<T, S>
where
    T: Cacheable,
    S: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        self.lifecycle.start_with(&self.name, || self.spawn_flush_worker())
    }

    fn stop(&self) {
        if !self.lifecycle.begin_stop(&self.name) {
            return;
        }

        self.running.store(false, Ordering::Release);
        let timeout = self.config.shutdown_timeout();
        if !self.workers.wait_for_exit(timeout) {
            let (updates, confirmations) = self.pending();
            let e = DispatchError::ShutdownTimeout {
                dispatcher: self.name.clone(),
                waited: timeout,
                pending: updates + confirmations,
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
