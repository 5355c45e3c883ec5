//! Composition root binding listeners to caches under a delivery policy.
//!
//! The service is constructed explicitly with its configuration and the
//! caches it manages, and owns every dispatcher it starts until `stop_all()`.

mod policy;
pub use policy::*;


use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use tracing::info;

use crate::BufferedDispatcher;
use crate::BulkAdapter;
use crate::BulkListener;
use crate::Cache;
use crate::CacheCategory;
use crate::CacheListener;
use crate::Cacheable;
use crate::ComparableCacheListener;
use crate::ComparableDispatcher;
use crate::ComparableListener;
use crate::DispatchConfig;
use crate::DispatcherHandle;
use crate::EntityId;
use crate::Error;
use crate::Lifecycle;
use crate::ListenerAdapter;
use crate::MultiThreadDispatcher;
use crate::Projection;
use crate::ReplayBulkListener;
use crate::Result;
use crate::Settings;
use crate::SingleListener;
use crate::SingleThreadDispatcher;
use crate::SynchronousDispatcher;

/// Registers listeners with the caches of one entity type
pub struct RegistrationService<T>
where
    T: Cacheable,
{
    config: DispatchConfig,
    caches: HashMap<CacheCategory, Arc<dyn Cache<T>>>,
    handles: Mutex<Vec<DispatcherHandle>>,
    next_id: AtomicU64,
}

impl<T> RegistrationService<T>
where
    T: Cacheable,
{
    pub fn new(settings: &Settings) -> Self {
        Self::with_config(settings.dispatch.clone())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            config,
            caches: HashMap::new(),
            handles: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Make a cache available for registrations under its category,
    /// replacing any cache previously attached for that category
    pub fn attach_cache(
        &mut self,
        cache: Arc<dyn Cache<T>>,
    ) -> &mut Self {
        let category = cache.category();
        debug!(category = ?category, "Cache attached");
        self.caches.insert(category, cache);
        self
    }

    pub fn cache(
        &self,
        category: CacheCategory,
    ) -> Option<&Arc<dyn Cache<T>>> {
        self.caches.get(&category)
    }

    /// Register a one-at-a-time listener on the given caches
    ///
    /// The dispatcher is started before it is attached, so mutations on the
    /// targeted caches are delivered from the moment this returns.
    pub fn register_listener(
        &self,
        listener: Arc<dyn SingleListener<T>>,
        policy: DeliveryPolicy,
        categories: &[CacheCategory],
    ) -> Result<DispatcherHandle> {
        policy.validate()?;
        let caches = self.resolve(categories)?;
        let name = self.dispatcher_name(policy.label());

        match policy {
            DeliveryPolicy::Synchronous => {
                let dispatcher = Arc::new(SynchronousDispatcher::new(name, ListenerAdapter::new(listener)));
                self.bind(dispatcher.clone(), dispatcher, &caches)
            }
            DeliveryPolicy::SingleThreaded => {
                let dispatcher = Arc::new(SingleThreadDispatcher::new(
                    name,
                    ListenerAdapter::new(listener),
                    self.config.single_thread.clone(),
                ));
                self.bind(dispatcher.clone(), dispatcher, &caches)
            }
            DeliveryPolicy::MultiThreaded { threads } => {
                let dispatcher = Arc::new(MultiThreadDispatcher::new(
                    name,
                    ListenerAdapter::new(listener),
                    threads,
                    self.config.thread_pool.clone(),
                )?);
                self.bind(dispatcher.clone(), dispatcher, &caches)
            }
            DeliveryPolicy::Buffered { period } => {
                let replay: Arc<dyn BulkListener<Arc<T>>> = Arc::new(ReplayBulkListener::new(listener));
                let projection: Projection<T, Arc<T>> = Arc::new(|entity: &Arc<T>| Arc::clone(entity));
                self.bind_buffered(name, BulkAdapter::new(replay, projection), period, &caches)
            }
        }
    }

    /// Register a bulk listener receiving batches of projections every `period`
    pub fn register_bulk_listener<S, F>(
        &self,
        listener: Arc<dyn BulkListener<S>>,
        projection: F,
        period: Duration,
        categories: &[CacheCategory],
    ) -> Result<DispatcherHandle>
    where
        S: Send + 'static,
        F: Fn(&Arc<T>) -> S + Send + Sync + 'static,
    {
        DeliveryPolicy::Buffered { period }.validate()?;
        let caches = self.resolve(categories)?;
        let name = self.dispatcher_name("buffered");
        self.bind_buffered(name, BulkAdapter::new(listener, Arc::new(projection)), period, &caches)
    }

    /// Register a bulk listener receiving batches of entity ids every `period`
    pub fn register_key_buffered(
        &self,
        listener: Arc<dyn BulkListener<EntityId>>,
        period: Duration,
        categories: &[CacheCategory],
    ) -> Result<DispatcherHandle> {
        self.register_bulk_listener(listener, |entity: &Arc<T>| entity.id(), period, categories)
    }

    /// Register a listener receiving the previous and new value on every
    /// overwrite, delivered in order on a dedicated worker
    pub fn register_comparable_listener(
        &self,
        listener: Arc<dyn ComparableListener<T>>,
        categories: &[CacheCategory],
    ) -> Result<DispatcherHandle> {
        let caches = self.resolve(categories)?;
        let name = self.dispatcher_name("comparable");
        let dispatcher = Arc::new(ComparableDispatcher::new(
            name,
            listener,
            self.config.single_thread.clone(),
        ));

        dispatcher.start()?;
        for cache in &caches {
            cache.register_comparable_listener(dispatcher.clone() as Arc<dyn ComparableCacheListener<T>>);
        }
        Ok(self.retain(dispatcher))
    }

    /// Stop every dispatcher started by this service, most recent first
    pub fn stop_all(&self) {
        let handles: Vec<DispatcherHandle> = self.handles.lock().drain(..).rev().collect();
        info!(dispatchers = handles.len(), "Stopping all registered dispatchers");
        for handle in handles {
            handle.stop();
        }
    }

    /// Number of dispatchers started and not yet released by `stop_all()`
    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }

    fn bind_buffered<S>(
        &self,
        name: String,
        adapter: BulkAdapter<T, S>,
        period: Duration,
        caches: &[Arc<dyn Cache<T>>],
    ) -> Result<DispatcherHandle>
    where
        S: Send + 'static,
    {
        let dispatcher = Arc::new(BufferedDispatcher::new(
            name,
            adapter,
            period,
            self.config.buffered.clone(),
        )?);
        self.bind(dispatcher.clone(), dispatcher, caches)
    }

    fn bind(
        &self,
        listener: Arc<dyn CacheListener<T>>,
        handle: DispatcherHandle,
        caches: &[Arc<dyn Cache<T>>],
    ) -> Result<DispatcherHandle> {
        handle.start()?;
        for cache in caches {
            cache.register_listener(Arc::clone(&listener));
        }
        info!(
            dispatcher = %handle.name(),
            caches = ?caches.iter().map(|c| c.category()).collect::<Vec<_>>(),
            "Listener registered"
        );
        Ok(self.retain(handle))
    }

    fn retain(
        &self,
        handle: DispatcherHandle,
    ) -> DispatcherHandle {
        self.handles.lock().push(Arc::clone(&handle));
        handle
    }

    fn resolve(
        &self,
        categories: &[CacheCategory],
    ) -> Result<Vec<Arc<dyn Cache<T>>>> {
        if categories.is_empty() {
            return Err(Error::InvalidConfig("registration needs at least one cache category".into()));
        }
        categories
            .iter()
            .map(|category| {
                self.caches
                    .get(category)
                    .cloned()
                    .ok_or(Error::UnknownCache(*category))
            })
            .collect()
    }

    fn dispatcher_name(
        &self,
        label: &str,
    ) -> String {
        format!("{}-{}", label, self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}
