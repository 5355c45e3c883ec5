use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use parking_lot::RwLock;
use tracing::error;
use tracing::trace;

use super::Cache;
use super::CacheCategory;
use super::Cacheable;
use super::EntityId;
use crate::CacheListener;
use crate::ComparableCacheListener;
use crate::Error;
use crate::NotificationKind;
use crate::Result;

/// In-process keyed store firing listeners on its mutation thread
///
/// Reads are lock-free. Notifying mutations are serialized per cache so the
/// listeners of one key are never called concurrently; the lock is reentrant,
/// so a synchronous listener may itself mutate the cache.
pub struct InMemoryCache<T>
where
    T: Cacheable,
{
    category: CacheCategory,
    entries: DashMap<EntityId, T>,
    mutation_lock: ReentrantMutex<()>,
    listeners: RwLock<Vec<Arc<dyn CacheListener<T>>>>,
    comparable_listeners: RwLock<Vec<Arc<dyn ComparableCacheListener<T>>>>,
}

impl<T> InMemoryCache<T>
where
    T: Cacheable,
{
    pub fn new(category: CacheCategory) -> Self {
        Self {
            category,
            entries: DashMap::new(),
            mutation_lock: ReentrantMutex::new(()),
            listeners: RwLock::new(Vec::new()),
            comparable_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Store the entity and notify all listeners with a snapshot of it
    ///
    /// Comparable listeners are notified first, and only when a previous
    /// value existed. Listener delivery failures are logged; the first
    /// lifecycle error (a dispatcher that is not running) is returned once
    /// every listener has been given the event.
    pub fn put(
        &self,
        entity: T,
    ) -> Result<()> {
        let _serialized = self.mutation_lock.lock();
        let snapshot = Arc::new(entity.clone());
        let original = self.entries.insert(entity.id(), entity);

        let compared = match original {
            Some(original) => self.notify_comparable_listeners(&Arc::new(original), &snapshot),
            None => Ok(()),
        };
        let notified = self.notify(NotificationKind::Update, &snapshot);
        compared.and(notified)
    }

    /// Store the entity without notifying anyone
    pub fn put_quiet(
        &self,
        entity: T,
    ) {
        let _serialized = self.mutation_lock.lock();
        self.entries.insert(entity.id(), entity);
    }

    /// Copy of the entity currently held under `id`
    pub fn get_copy(
        &self,
        id: EntityId,
    ) -> Option<T> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(
        &self,
        id: EntityId,
    ) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Notify listeners of an update for an entity already stored, e.g.
    /// after `put_quiet`
    pub fn notify_listeners_of_update(
        &self,
        id: EntityId,
    ) -> Result<()> {
        let _serialized = self.mutation_lock.lock();
        let snapshot = self.get_copy(id).ok_or(Error::EntityNotFound(id))?;
        self.notify(NotificationKind::Update, &Arc::new(snapshot))
    }

    /// Notify listeners that the status of `entity` was re-confirmed
    pub fn notify_status_confirmation(
        &self,
        entity: &T,
    ) -> Result<()> {
        let _serialized = self.mutation_lock.lock();
        self.notify(NotificationKind::StatusConfirmation, &Arc::new(entity.clone()))
    }

    fn notify(
        &self,
        kind: NotificationKind,
        snapshot: &Arc<T>,
    ) -> Result<()> {
        let listeners = self.listeners.read().clone();
        trace!(category = ?self.category, kind = %kind, id = snapshot.id(), listeners = listeners.len(), "Notifying listeners");

        let mut lifecycle_failure = None;
        for listener in listeners.iter() {
            let result = match kind {
                NotificationKind::Update => listener.on_update(snapshot),
                NotificationKind::StatusConfirmation => listener.on_status_confirm(snapshot),
            };
            if let Err(e) = result {
                self.record_failure(kind, snapshot.id(), e, &mut lifecycle_failure);
            }
        }
        lifecycle_failure.map_or(Ok(()), Err)
    }

    fn notify_comparable_listeners(
        &self,
        original: &Arc<T>,
        updated: &Arc<T>,
    ) -> Result<()> {
        let listeners = self.comparable_listeners.read().clone();

        let mut lifecycle_failure = None;
        for listener in listeners.iter() {
            if let Err(e) = listener.on_compare_update(original, updated) {
                self.record_failure(NotificationKind::Update, updated.id(), e, &mut lifecycle_failure);
            }
        }
        lifecycle_failure.map_or(Ok(()), Err)
    }

    /// Synchronous listener failures are logged and swallowed; lifecycle
    /// violations are kept for the caller
    fn record_failure(
        &self,
        kind: NotificationKind,
        id: EntityId,
        error: Error,
        lifecycle_failure: &mut Option<Error>,
    ) {
        match error {
            Error::Listener(e) => {
                error!(category = ?self.category, kind = %kind, id, "Synchronous listener failed: {}", e);
            }
            other => {
                error!(category = ?self.category, kind = %kind, id, "Listener notification rejected: {}", other);
                if lifecycle_failure.is_none() {
                    *lifecycle_failure = Some(other);
                }
            }
        }
    }
}

impl<T> Cache<T> for InMemoryCache<T>
where
    T: Cacheable,
{
    fn category(&self) -> CacheCategory {
        self.category
    }

    fn register_listener(
        &self,
        listener: Arc<dyn CacheListener<T>>,
    ) {
        self.listeners.write().push(listener);
    }

    fn register_comparable_listener(
        &self,
        listener: Arc<dyn ComparableCacheListener<T>>,
    ) {
        self.comparable_listeners.write().push(listener);
    }

    fn listener_task_queue_sizes(&self) -> Vec<usize> {
        let simple = self.listeners.read().iter().filter_map(|l| l.task_queue_size()).collect::<Vec<_>>();
        let comparable = self.comparable_listeners.read().iter().filter_map(|l| l.task_queue_size()).collect::<Vec<_>>();
        simple.into_iter().chain(comparable).collect()
    }

    fn active_thread_counts(&self) -> Vec<usize> {
        self.listeners.read().iter().filter_map(|l| l.active_threads()).collect()
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len() + self.comparable_listeners.read().len()
    }
}
