use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::isolate;
use super::Lifecycle;
use super::LifecycleCell;
use super::LifecycleState;
use crate::CacheListener;
use crate::Cacheable;
use crate::Error;
use crate::ListenerAdapter;
use crate::Result;

/// Calls straight through to the listener on the cache-mutation thread
///
/// Listener failures are returned to the cache, which logs them and goes on
/// notifying its other listeners. A synchronous registration cannot be
/// detached: `stop()` is a no-op.
pub struct SynchronousDispatcher<T>
where
    T: Cacheable,
{
    name: String,
    lifecycle: LifecycleCell,
    adapter: ListenerAdapter<T>,
}

impl<T> SynchronousDispatcher<T>
where
    T: Cacheable,
{
    pub fn new(
        name: impl Into<String>,
        adapter: ListenerAdapter<T>,
    ) -> Self {
        Self {
            name: name.into(),
            lifecycle: LifecycleCell::new(),
            adapter,
        }
    }
}

impl<T> CacheListener<T> for SynchronousDispatcher<T>
where
    T: Cacheable,
{
    fn on_update(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.lifecycle.ensure_running(&self.name)?;
        isolate(|| self.adapter.on_update(entity)).map_err(Error::from)
    }

    fn on_status_confirm(
        &self,
        entity: &Arc<T>,
    ) -> Result<()> {
        self.lifecycle.ensure_running(&self.name)?;
        isolate(|| self.adapter.on_status_confirm(entity)).map_err(Error::from)
    }
}

impl<T> Lifecycle for SynchronousDispatcher<T>
where
    T: Cacheable,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&self) -> Result<()> {
        self.lifecycle.try_start(&self.name)?;
        Ok(())
    }

    fn stop(&self) {
        if self.lifecycle.is_running() {
            warn!(
                dispatcher = %self.name,
                "Synchronous listeners stay attached until process shutdown; stop ignored"
            );
        } else {
            debug!(dispatcher = %self.name, "Stop requested on synchronous dispatcher that never started");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.get()
    }
}
