//! Listener contracts.
//!
//! Two sides meet here:
//! - module-facing capability traits ([`SingleListener`], [`BulkListener`],
//!   [`ComparableListener`]) implemented by consumers of cache events;
//! - the cache-facing entry points ([`CacheListener`],
//!   [`ComparableCacheListener`]) that caches invoke on their own mutation
//!   thread and that every dispatcher implements.

mod adapter;
mod notification;
pub use adapter::*;
pub use notification::*;

#[cfg(test)]
mod adapter_test;

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::Cacheable;
use crate::ListenerResult;
use crate::Result;

/// Listener receiving one entity snapshot at a time
///
/// Implementations registered under a multi-thread policy are invoked from
/// several worker threads concurrently.
#[cfg_attr(test, automock)]
pub trait SingleListener<T>: Send + Sync + 'static
where
    T: Cacheable,
{
    /// A cache entity was updated
    fn notify_element_updated(
        &self,
        entity: &T,
    ) -> ListenerResult;

    /// The current status of a cache entity was re-confirmed without change
    fn confirm_status(
        &self,
        entity: &T,
    ) -> ListenerResult;
}

/// Listener receiving batches of projections, once per non-empty flush cycle
pub trait BulkListener<S>: Send + Sync + 'static
where
    S: Send + 'static,
{
    fn notify_elements_updated(
        &self,
        batch: &[S],
    ) -> ListenerResult;

    fn confirm_statuses(
        &self,
        batch: &[S],
    ) -> ListenerResult;
}

/// Listener receiving the value held before an update together with the new one
#[cfg_attr(test, automock)]
pub trait ComparableListener<T>: Send + Sync + 'static
where
    T: Cacheable,
{
    fn notify_element_updated(
        &self,
        original: &T,
        updated: &T,
    ) -> ListenerResult;
}

/// Entry point a cache invokes, synchronously, for every notifying mutation
///
/// Snapshots are shared between all listeners of a cache through `Arc`.
pub trait CacheListener<T>: Send + Sync
where
    T: Cacheable,
{
    fn on_update(
        &self,
        entity: &Arc<T>,
    ) -> Result<()>;

    fn on_status_confirm(
        &self,
        entity: &Arc<T>,
    ) -> Result<()>;

    /// Notifications queued and not yet delivered, for listeners owning a queue
    fn task_queue_size(&self) -> Option<usize> {
        None
    }

    /// Worker threads currently alive, for pooled listeners
    fn active_threads(&self) -> Option<usize> {
        None
    }
}

/// Entry point a cache invokes on `put` when a previous value existed
pub trait ComparableCacheListener<T>: Send + Sync
where
    T: Cacheable,
{
    fn on_compare_update(
        &self,
        original: &Arc<T>,
        updated: &Arc<T>,
    ) -> Result<()>;

    fn task_queue_size(&self) -> Option<usize> {
        None
    }
}
