use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::wait_until;
use crate::test_utils::BatchRecorder;
use crate::test_utils::TestTag;
use crate::BufferedConfig;
use crate::BulkAdapter;
use crate::BulkListener;
use crate::CacheListener;
use crate::EntityId;
use crate::Error;
use crate::ListenerError;
use crate::ListenerResult;
use crate::NotificationKind;

fn buffer_config(drain_cap: usize) -> BufferedConfig {
    BufferedConfig {
        drain_cap,
        sleep_granularity_ms: 2,
        shutdown_timeout_ms: 2_000,
    }
}

fn id_dispatcher(
    recorder: Arc<BatchRecorder<EntityId>>,
    period: Duration,
    drain_cap: usize,
) -> BufferedDispatcher<TestTag, EntityId> {
    let adapter: BulkAdapter<TestTag, EntityId> = BulkAdapter::new(recorder, Arc::new(|tag: &Arc<TestTag>| tag.id));
    BufferedDispatcher::new("buffer-test", adapter, period, buffer_config(drain_cap)).unwrap()
}

#[test]
fn test_one_batch_per_kind_per_period() {
    enable_logger();
    let recorder = Arc::new(BatchRecorder::default());
    let d = id_dispatcher(recorder.clone(), Duration::from_millis(100), 20_000);
    d.start().unwrap();

    for id in 1..=5 {
        d.on_update(&Arc::new(TestTag::new(id, 0))).unwrap();
    }
    d.on_status_confirm(&Arc::new(TestTag::new(6, 0))).unwrap();
    d.on_status_confirm(&Arc::new(TestTag::new(7, 0))).unwrap();
    assert_eq!(d.pending(), (5, 2));

    assert!(wait_until(Duration::from_secs(2), || recorder.total() == 7));
    assert_eq!(recorder.batches_of(NotificationKind::Update), vec![vec![1, 2, 3, 4, 5]]);
    assert_eq!(recorder.batches_of(NotificationKind::StatusConfirmation), vec![vec![6, 7]]);
    d.stop();
}

#[test]
fn test_drain_cap_spreads_backlog_over_cycles() {
    let recorder = Arc::new(BatchRecorder::default());
    let d = id_dispatcher(recorder.clone(), Duration::from_millis(50), 3);
    d.start().unwrap();

    for id in 0..7 {
        d.on_update(&Arc::new(TestTag::new(id, 0))).unwrap();
    }

    assert!(wait_until(Duration::from_secs(2), || recorder.total() == 7));
    let batches = recorder.batches_of(NotificationKind::Update);
    assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);
    assert_eq!(batches.concat(), (0..7).collect::<Vec<_>>());
    d.stop();
}

#[test]
fn test_idle_cycles_do_not_call_listener() {
    let recorder = Arc::new(BatchRecorder::<EntityId>::default());
    let d = id_dispatcher(recorder.clone(), Duration::from_millis(10), 100);
    d.start().unwrap();

    std::thread::sleep(Duration::from_millis(60));
    assert!(recorder.batches.lock().is_empty());
    d.stop();
    assert!(recorder.batches.lock().is_empty());
}

#[test]
fn test_stop_flushes_pending_without_waiting_out_period() {
    let recorder = Arc::new(BatchRecorder::default());
    let d = id_dispatcher(recorder.clone(), Duration::from_secs(10), 2);
    d.start().unwrap();

    for id in 0..5 {
        d.on_update(&Arc::new(TestTag::new(id, 0))).unwrap();
    }
    d.on_status_confirm(&Arc::new(TestTag::new(9, 0))).unwrap();

    let begin = Instant::now();
    d.stop();
    assert!(begin.elapsed() < Duration::from_secs(5));

    assert_eq!(recorder.batches_of(NotificationKind::Update).concat(), vec![0, 1, 2, 3, 4]);
    assert_eq!(recorder.batches_of(NotificationKind::StatusConfirmation), vec![vec![9]]);
    assert_eq!(d.pending(), (0, 0));
    assert_eq!(d.state(), LifecycleState::Stopped);
}

#[test]
fn test_projection_runs_at_enqueue_time() {
    let recorder = Arc::new(BatchRecorder::<i64>::default());
    let projected = Arc::new(AtomicUsize::new(0));
    let counter = projected.clone();
    let adapter: BulkAdapter<TestTag, i64> = BulkAdapter::new(
        recorder.clone() as Arc<dyn BulkListener<i64>>,
        Arc::new(move |tag: &Arc<TestTag>| {
            counter.fetch_add(1, Ordering::SeqCst);
            tag.value * 10
        }),
    );
    let d = BufferedDispatcher::new("buffer-projection", adapter, Duration::from_secs(10), buffer_config(100)).unwrap();
    d.start().unwrap();

    d.on_update(&Arc::new(TestTag::new(1, 4))).unwrap();
    d.on_update(&Arc::new(TestTag::new(2, 5))).unwrap();
    assert_eq!(projected.load(Ordering::SeqCst), 2);

    d.stop();
    assert_eq!(recorder.batches_of(NotificationKind::Update), vec![vec![40, 50]]);
}

#[test]
fn test_failing_bulk_listener_still_gets_every_batch() {
    enable_logger();

    #[derive(Default)]
    struct Rejecting {
        calls: AtomicUsize,
    }

    impl BulkListener<EntityId> for Rejecting {
        fn notify_elements_updated(
            &self,
            _batch: &[EntityId],
        ) -> ListenerResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                panic!("first flush fails");
            }
            Err(ListenerError::Rejected("downstream unavailable".into()))
        }

        fn confirm_statuses(
            &self,
            _batch: &[EntityId],
        ) -> ListenerResult {
            Ok(())
        }
    }

    let listener = Arc::new(Rejecting::default());
    let adapter: BulkAdapter<TestTag, EntityId> = BulkAdapter::new(
        listener.clone() as Arc<dyn BulkListener<EntityId>>,
        Arc::new(|tag: &Arc<TestTag>| tag.id),
    );
    let d = BufferedDispatcher::new("buffer-failing", adapter, Duration::from_millis(20), buffer_config(1)).unwrap();
    d.start().unwrap();

    for id in 0..3 {
        d.on_update(&Arc::new(TestTag::new(id, 0))).unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || listener.calls.load(Ordering::SeqCst) == 3));
    assert!(d.is_running());
    d.stop();
}

#[test]
fn test_lifecycle_rules() {
    let recorder = Arc::new(BatchRecorder::default());
    let d = id_dispatcher(recorder, Duration::from_millis(20), 10);
    let tag = Arc::new(TestTag::new(1, 0));

    assert!(d.on_update(&tag).unwrap_err().is_not_running());
    d.start().unwrap();
    d.start().unwrap();
    d.stop();
    d.stop();

    assert!(d.on_status_confirm(&tag).unwrap_err().is_not_running());
    assert!(d.start().is_err());
}

#[test]
fn test_rejects_zero_period_and_cap() {
    let recorder: Arc<dyn BulkListener<EntityId>> = Arc::new(BatchRecorder::<EntityId>::default());
    let projection = |tag: &Arc<TestTag>| tag.id;

    let zero_period = BufferedDispatcher::<TestTag, EntityId>::new(
        "buffer-invalid",
        BulkAdapter::new(recorder.clone(), Arc::new(projection)),
        Duration::ZERO,
        buffer_config(10),
    );
    assert!(matches!(zero_period, Err(Error::InvalidConfig(_))));

    let zero_cap = BufferedDispatcher::<TestTag, EntityId>::new(
        "buffer-invalid",
        BulkAdapter::new(recorder, Arc::new(projection)),
        Duration::from_millis(10),
        buffer_config(0),
    );
    assert!(matches!(zero_cap, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_every_accepted_projection_is_flushed_when_stop_races_producer() {
    enable_logger();
    let recorder = Arc::new(BatchRecorder::<EntityId>::default());
    let d = id_dispatcher(recorder.clone(), Duration::from_millis(5), 1_000);
    d.start().unwrap();

    let accepted = std::thread::scope(|s| {
        let producer = s.spawn(|| {
            let mut accepted = 0;
            for id in 0.. {
                if d.on_update(&Arc::new(TestTag::new(id, 0))).is_err() {
                    break;
                }
                accepted += 1;
                std::thread::sleep(Duration::from_micros(50));
            }
            accepted
        });
        std::thread::sleep(Duration::from_millis(20));
        d.stop();
        producer.join().unwrap()
    });

    assert!(accepted > 0);
    assert_eq!(recorder.total(), accepted);
    assert_eq!(d.pending(), (0, 0));
}

#[test]
fn test_stop_racing_start_never_leaves_a_flush_worker_behind() {
    for _ in 0..20 {
        let recorder = Arc::new(BatchRecorder::<EntityId>::default());
        let d = id_dispatcher(recorder, Duration::from_millis(5), 10);

        std::thread::scope(|s| {
            s.spawn(|| d.start());
            s.spawn(|| d.stop());
        });
        d.stop();

        assert_eq!(d.state(), LifecycleState::Stopped);
        assert!(!d.is_flushing());
    }
}
