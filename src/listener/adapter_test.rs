use std::sync::Arc;

use mockall::predicate::eq;
use mockall::Sequence;

use super::*;
use crate::test_utils::BatchRecorder;
use crate::test_utils::PanicsOnId;
use crate::test_utils::RecordingListener;
use crate::test_utils::TestTag;
use crate::ListenerError;

#[test]
fn test_listener_adapter_routes_by_kind() {
    let listener = Arc::new(RecordingListener::default());
    let adapter = ListenerAdapter::<TestTag>::new(listener.clone());

    adapter.deliver(&Notification::update(Arc::new(TestTag::new(1, 0)))).unwrap();
    adapter
        .deliver(&Notification::status_confirmation(Arc::new(TestTag::new(2, 0))))
        .unwrap();
    adapter.on_update(&TestTag::new(3, 0)).unwrap();

    assert_eq!(
        *listener.received.lock(),
        vec![
            (NotificationKind::Update, 1),
            (NotificationKind::StatusConfirmation, 2),
            (NotificationKind::Update, 3),
        ]
    );
}

#[test]
fn test_listener_adapter_returns_listener_error() {
    let mut listener = MockSingleListener::<TestTag>::new();
    listener
        .expect_confirm_status()
        .times(1)
        .returning(|_| Err(ListenerError::Rejected("stale".into())));

    let adapter = ListenerAdapter::<TestTag>::new(Arc::new(listener));
    let result = adapter.on_status_confirm(&TestTag::new(1, 0));
    assert!(matches!(result, Err(ListenerError::Rejected(reason)) if reason == "stale"));
}

#[test]
fn test_bulk_adapter_projects_and_routes() {
    let recorder = Arc::new(BatchRecorder::<i64>::default());
    let adapter: BulkAdapter<TestTag, i64> =
        BulkAdapter::new(recorder.clone(), Arc::new(|tag: &Arc<TestTag>| tag.value + 1));

    assert_eq!(adapter.project(&Arc::new(TestTag::new(1, 41))), 42);

    adapter.deliver_batch(NotificationKind::Update, &[1, 2]).unwrap();
    adapter.deliver_batch(NotificationKind::StatusConfirmation, &[3]).unwrap();

    assert_eq!(recorder.batches_of(NotificationKind::Update), vec![vec![1, 2]]);
    assert_eq!(recorder.batches_of(NotificationKind::StatusConfirmation), vec![vec![3]]);
}

#[test]
fn test_replay_preserves_batch_order() {
    let mut listener = MockSingleListener::<TestTag>::new();
    let mut seq = Sequence::new();
    for id in [3, 1, 2] {
        listener
            .expect_notify_element_updated()
            .with(eq(TestTag::new(id, 0)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
    }

    let replay = ReplayBulkListener::<TestTag>::new(Arc::new(listener));
    let batch: Vec<Arc<TestTag>> = [3, 1, 2].into_iter().map(|id| Arc::new(TestTag::new(id, 0))).collect();
    replay.notify_elements_updated(&batch).unwrap();
}

#[test]
fn test_replay_continues_after_failure_and_reports_first() {
    let mut listener = MockSingleListener::<TestTag>::new();
    listener.expect_confirm_status().times(3).returning(|tag| match tag.id {
        1 => Err(ListenerError::Rejected("first".into())),
        2 => Err(ListenerError::Rejected("second".into())),
        _ => Ok(()),
    });

    let replay = ReplayBulkListener::<TestTag>::new(Arc::new(listener));
    let batch: Vec<Arc<TestTag>> = (1..=3).map(|id| Arc::new(TestTag::new(id, 0))).collect();

    let result = replay.confirm_statuses(&batch);
    assert!(matches!(result, Err(ListenerError::Rejected(reason)) if reason == "first"));
}

#[test]
fn test_replay_contains_panic_to_one_element() {
    let listener = Arc::new(PanicsOnId::new(2));
    let replay = ReplayBulkListener::<TestTag>::new(listener.clone());
    let batch: Vec<Arc<TestTag>> = (1..=4).map(|id| Arc::new(TestTag::new(id, 0))).collect();

    let result = replay.notify_elements_updated(&batch);

    assert!(matches!(result, Err(ListenerError::Panicked(message)) if message == "boom on 2"));
    assert_eq!(listener.inner.ids(), vec![1, 3, 4]);
}
