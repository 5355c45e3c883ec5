use std::marker::PhantomData;
use std::sync::Arc;

use tracing::error;

use super::BulkListener;
use super::Notification;
use super::NotificationKind;
use super::SingleListener;
use crate::dispatch::isolate;
use crate::Cacheable;
use crate::ListenerResult;

/// Derives the lightweight value a buffered queue retains for an entity
pub type Projection<T, S> = Arc<dyn Fn(&Arc<T>) -> S + Send + Sync>;

/// Uniform entry point over a [`SingleListener`]
///
/// Routes each notification to the listener method matching its kind. Does
/// no failure handling of its own: errors go back to the calling dispatcher.
pub struct ListenerAdapter<T>
where
    T: Cacheable,
{
    listener: Arc<dyn SingleListener<T>>,
}

impl<T> ListenerAdapter<T>
where
    T: Cacheable,
{
    pub fn new(listener: Arc<dyn SingleListener<T>>) -> Self {
        Self { listener }
    }

    pub fn on_update(
        &self,
        entity: &T,
    ) -> ListenerResult {
        self.listener.notify_element_updated(entity)
    }

    pub fn on_status_confirm(
        &self,
        entity: &T,
    ) -> ListenerResult {
        self.listener.confirm_status(entity)
    }

    /// Deliver a tagged notification to the matching listener method
    pub fn deliver(
        &self,
        notification: &Notification<Arc<T>>,
    ) -> ListenerResult {
        match notification.kind {
            NotificationKind::Update => self.on_update(&notification.payload),
            NotificationKind::StatusConfirmation => self.on_status_confirm(&notification.payload),
        }
    }
}

/// Uniform entry point over a [`BulkListener`], carrying the projection
/// applied to every entity at enqueue time
pub struct BulkAdapter<T, S>
where
    T: Cacheable,
    S: Send + 'static,
{
    listener: Arc<dyn BulkListener<S>>,
    projection: Projection<T, S>,
}

impl<T, S> BulkAdapter<T, S>
where
    T: Cacheable,
    S: Send + 'static,
{
    pub fn new(
        listener: Arc<dyn BulkListener<S>>,
        projection: Projection<T, S>,
    ) -> Self {
        Self { listener, projection }
    }

    pub fn project(
        &self,
        entity: &Arc<T>,
    ) -> S {
        (self.projection)(entity)
    }

    /// Deliver one drained batch to the listener method matching `kind`
    pub fn deliver_batch(
        &self,
        kind: NotificationKind,
        batch: &[S],
    ) -> ListenerResult {
        match kind {
            NotificationKind::Update => self.listener.notify_elements_updated(batch),
            NotificationKind::StatusConfirmation => self.listener.confirm_statuses(batch),
        }
    }
}

/// Presents a [`SingleListener`] as a bulk listener of snapshots
///
/// Each batch is replayed element by element in order. A failing or panicking
/// element is logged and skipped; the first failure is reported once the
/// batch is done.
pub struct ReplayBulkListener<T>
where
    T: Cacheable,
{
    inner: Arc<dyn SingleListener<T>>,
    _entity: PhantomData<fn(T)>,
}

impl<T> ReplayBulkListener<T>
where
    T: Cacheable,
{
    pub fn new(inner: Arc<dyn SingleListener<T>>) -> Self {
        Self {
            inner,
            _entity: PhantomData,
        }
    }

    fn replay<F>(
        &self,
        kind: NotificationKind,
        batch: &[Arc<T>],
        deliver: F,
    ) -> ListenerResult
    where
        F: Fn(&T) -> ListenerResult,
    {
        let mut first_failure = None;
        for entity in batch {
            if let Err(e) = isolate(|| deliver(entity)) {
                error!(kind = %kind, id = entity.id(), "Replayed delivery failed: {}", e);
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T> BulkListener<Arc<T>> for ReplayBulkListener<T>
where
    T: Cacheable,
{
    fn notify_elements_updated(
        &self,
        batch: &[Arc<T>],
    ) -> ListenerResult {
        self.replay(NotificationKind::Update, batch, |e| self.inner.notify_element_updated(e))
    }

    fn confirm_statuses(
        &self,
        batch: &[Arc<T>],
    ) -> ListenerResult {
        self.replay(NotificationKind::StatusConfirmation, batch, |e| self.inner.confirm_status(e))
    }
}
