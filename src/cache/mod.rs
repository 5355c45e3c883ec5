//! Keyed entity store acting as the event source of the fan-out engine.
//!
//! Every successful `put` fires the registered listeners synchronously, on the
//! calling thread. Listeners only ever receive a snapshot (a clone taken once
//! per mutation), never a reference into the store.

mod memory;
pub use memory::*;


use std::fmt::Debug;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::CacheListener;
use crate::ComparableCacheListener;

/// Identity of a cached entity
pub type EntityId = u64;

/// A keyed, versioned domain object held by a [`Cache`]
///
/// Clones are used as immutable notification snapshots, so `clone()` must
/// produce a value that stays internally consistent while the cached original
/// keeps being mutated.
pub trait Cacheable: Clone + Debug + Send + Sync + 'static {
    fn id(&self) -> EntityId;
}

/// Entity category a cache holds; the unit listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheCategory {
    DataTag,
    RuleTag,
    ControlTag,
    Alarm,
    Equipment,
    SubEquipment,
    Process,
}

impl CacheCategory {
    /// Categories whose entities are tags
    pub const TAGS: [CacheCategory; 3] = [
        CacheCategory::DataTag,
        CacheCategory::RuleTag,
        CacheCategory::ControlTag,
    ];

    /// Categories whose entities carry supervision status
    pub const SUPERVISED: [CacheCategory; 3] = [
        CacheCategory::Process,
        CacheCategory::Equipment,
        CacheCategory::SubEquipment,
    ];
}

/// Listener-registration surface of a cache
///
/// Registration is append-only: a registered listener stays attached for the
/// lifetime of the cache.
pub trait Cache<T>: Send + Sync
where
    T: Cacheable,
{
    fn category(&self) -> CacheCategory;

    /// Attach a listener fired on every notifying mutation
    fn register_listener(
        &self,
        listener: Arc<dyn CacheListener<T>>,
    );

    /// Attach a listener fired with the previous and new value on `put`
    fn register_comparable_listener(
        &self,
        listener: Arc<dyn ComparableCacheListener<T>>,
    );

    /// Queue sizes reported by the registered listeners that own a queue
    fn listener_task_queue_sizes(&self) -> Vec<usize>;

    /// Worker thread counts reported by pooled listeners
    fn active_thread_counts(&self) -> Vec<usize>;

    /// Number of attached listeners, comparable ones included
    fn listener_count(&self) -> usize;
}
