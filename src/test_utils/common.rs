use std::time::Duration;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::Cacheable;
use crate::EntityId;
use crate::SingleThreadConfig;
use crate::ThreadPoolConfig;

static LOGGER_INIT: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub(crate) fn enable_logger() {
    Lazy::force(&LOGGER_INIT);
}

/// Minimal tag entity used as cache content in tests
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TestTag {
    pub(crate) id: EntityId,
    pub(crate) value: i64,
}

impl TestTag {
    pub(crate) fn new(
        id: EntityId,
        value: i64,
    ) -> Self {
        Self { id, value }
    }
}

impl Cacheable for TestTag {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Polls `condition` every few milliseconds until it holds or `timeout` expires
pub(crate) fn wait_until<F>(
    timeout: Duration,
    condition: F,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub(crate) fn fast_single_thread_config() -> SingleThreadConfig {
    SingleThreadConfig {
        poll_interval_ms: 5,
        shutdown_timeout_ms: 2_000,
    }
}

pub(crate) fn fast_pool_config(queue_capacity: usize) -> ThreadPoolConfig {
    ThreadPoolConfig {
        queue_capacity,
        poll_timeout_ms: 5,
        shutdown_timeout_ms: 2_000,
        shutdown_grace_ms: 200,
    }
}
