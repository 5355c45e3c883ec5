//! # cache-fanout
//!
//! Propagates state changes of a keyed entity cache (value updates, status
//! confirmations) to any number of independently paced listener modules,
//! without letting a slow listener stall the thread mutating the cache.
//!
//! ```text
//! Cache::put ─► CacheListener (on the mutation thread)
//!                 ├─ Synchronous     ─► listener
//!                 ├─ SingleThreaded  ─► unbounded FIFO ─► 1 worker ─► listener
//!                 ├─ MultiThreaded   ─► bounded queue  ─► N workers ─► listener
//!                 └─ Buffered        ─► update/confirm queues ─► periodic bulk flush
//! ```
//!
//! Listeners are wired through a [`RegistrationService`], which owns the
//! dispatchers it starts:
//!
//! ```ignore
//! let tags = Arc::new(InMemoryCache::<Tag>::new(CacheCategory::DataTag));
//! let mut service = RegistrationService::new(&Settings::new()?.validate()?);
//! service.attach_cache(tags.clone());
//!
//! let handle = service.register_listener(indexer, DeliveryPolicy::multi_threaded(4), &[CacheCategory::DataTag])?;
//! tags.put(tag)?;
//! service.stop_all();
//! ```
//!
//! ## Observability model
//!
//! Library code emits `tracing` events and never installs a global subscriber.
//! Listener failures surface only in logs.

mod cache;
mod config;
mod constants;
mod dispatch;
mod errors;
mod listener;
mod registration;

pub use cache::*;
pub use self::config::*;
pub use dispatch::*;
pub use errors::*;
pub use listener::*;
pub use registration::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
