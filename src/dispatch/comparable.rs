use std::sync::Arc;

use tracing::error;

use super::isolate;
use super::single_thread::SerialHandler;
use super::single_thread::SerialWorker;
use super::Lifecycle;
use super::LifecycleState;
use crate::constants::COMPARABLE_WORKER_PREFIX;
use crate::Cacheable;
use crate::ComparableCacheListener;
use crate::ComparableListener;
use crate::Result;
use crate::SingleThreadConfig;

/// Delivers `(original, updated)` pairs to a [`ComparableListener`] on one
/// dedicated worker, in the order the cache produced them
pub struct ComparableDispatcher<T>
where
    T: Cacheable,
{
    worker: SerialWorker<(Arc<T>, Arc<T>)>,
}

impl<T> ComparableDispatcher<T>
where
    T: Cacheable,
{
    pub fn new(
        name: impl Into<String>,
        listener: Arc<dyn ComparableListener<T>>,
        config: SingleThreadConfig,
    ) -> Self {
        let name = name.into();
        let handler_name = name.clone();
        let handler: SerialHandler<(Arc<T>, Arc<T>)> = Arc::new(move |(original, updated): (Arc<T>, Arc<T>)| {
            if let Err(e) = isolate(|| listener.notify_element_updated(&original, &updated)) {
                error!(
                    dispatcher = %handler_name,
                    id = updated.id(),
                    "Comparable listener delivery failed: {}",
                    e
                );
            }
        });

        Self {
            worker: SerialWorker::new(name, COMPARABLE_WORKER_PREFIX, config, handler),
        }
    }
}

impl<T> ComparableCacheListener<T> for ComparableDispatcher<T>
where
    T: Cacheable,
{
    fn on_compare_update(
        &self,
        original: &Arc<T>,
        updated: &Arc<T>,
    ) -> Result<()> {
        self.worker.enqueue((Arc::clone(original), Arc::clone(updated)))
    }

    fn task_queue_size(&self) -> Option<usize> {
        Some(self.worker.queue_size())
    }
}

impl<T> Lifecycle for ComparableDispatcher<T>
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
