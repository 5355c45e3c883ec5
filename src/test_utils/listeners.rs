use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;

use super::TestTag;
use crate::BulkListener;
use crate::EntityId;
use crate::ListenerError;
use crate::ListenerResult;
use crate::NotificationKind;
use crate::SingleListener;

/// Records `(kind, id)` for every delivered notification
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub(crate) received: Mutex<Vec<(NotificationKind, EntityId)>>,
    delay: Option<Duration>,
}

impl RecordingListener {
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub(crate) fn ids(&self) -> Vec<EntityId> {
        self.received.lock().iter().map(|(_, id)| *id).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.received.lock().len()
    }

    fn record(
        &self,
        kind: NotificationKind,
        entity: &TestTag,
    ) -> ListenerResult {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.received.lock().push((kind, entity.id));
        Ok(())
    }
}

impl SingleListener<TestTag> for RecordingListener {
    fn notify_element_updated(
        &self,
        entity: &TestTag,
    ) -> ListenerResult {
        self.record(NotificationKind::Update, entity)
    }

    fn confirm_status(
        &self,
        entity: &TestTag,
    ) -> ListenerResult {
        self.record(NotificationKind::StatusConfirmation, entity)
    }
}

/// Fails every call, alternating between an error and a panic
#[derive(Default)]
pub(crate) struct FailingListener {
    pub(crate) calls: AtomicUsize,
}

impl FailingListener {
    fn fail(&self) -> ListenerResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call % 2 == 0 {
            Err(ListenerError::Rejected(format!("call {call}")))
        } else {
            panic!("listener failure on call {call}");
        }
    }
}

impl SingleListener<TestTag> for FailingListener {
    fn notify_element_updated(
        &self,
        _entity: &TestTag,
    ) -> ListenerResult {
        self.fail()
    }

    fn confirm_status(
        &self,
        _entity: &TestTag,
    ) -> ListenerResult {
        self.fail()
    }
}

/// Records like [`RecordingListener`] but panics on one entity id
pub(crate) struct PanicsOnId {
    pub(crate) target: EntityId,
    pub(crate) inner: RecordingListener,
}

impl PanicsOnId {
    pub(crate) fn new(target: EntityId) -> Self {
        Self {
            target,
            inner: RecordingListener::default(),
        }
    }

    fn check(
        &self,
        entity: &TestTag,
    ) {
        if entity.id == self.target {
            panic!("boom on {}", entity.id);
        }
    }
}

impl SingleListener<TestTag> for PanicsOnId {
    fn notify_element_updated(
        &self,
        entity: &TestTag,
    ) -> ListenerResult {
        self.check(entity);
        self.inner.notify_element_updated(entity)
    }

    fn confirm_status(
        &self,
        entity: &TestTag,
    ) -> ListenerResult {
        self.check(entity);
        self.inner.confirm_status(entity)
    }
}

/// Records every batch handed to a bulk listener
pub(crate) struct BatchRecorder<S> {
    pub(crate) batches: Mutex<Vec<(NotificationKind, Vec<S>)>>,
}

impl<S> Default for BatchRecorder<S> {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }
}

impl<S: Clone> BatchRecorder<S> {
    pub(crate) fn batches_of(
        &self,
        kind: NotificationKind,
    ) -> Vec<Vec<S>> {
        self.batches
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, batch)| batch.clone())
            .collect()
    }

    pub(crate) fn total(&self) -> usize {
        self.batches.lock().iter().map(|(_, batch)| batch.len()).sum()
    }
}

impl<S> BulkListener<S> for BatchRecorder<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn notify_elements_updated(
        &self,
        batch: &[S],
    ) -> ListenerResult {
        self.batches.lock().push((NotificationKind::Update, batch.to_vec()));
        Ok(())
    }

    fn confirm_statuses(
        &self,
        batch: &[S],
    ) -> ListenerResult {
        self.batches
            .lock()
            .push((NotificationKind::StatusConfirmation, batch.to_vec()));
        Ok(())
    }
}
