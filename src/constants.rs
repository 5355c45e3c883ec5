// -
// Dispatcher defaults

/// Shared task queue capacity of a multi-thread pool dispatcher
pub(crate) const DEFAULT_POOL_QUEUE_CAPACITY: usize = 10_000;

/// Maximum notifications drained from each buffered queue per flush cycle
pub(crate) const DEFAULT_BUFFER_DRAIN_CAP: usize = 20_000;

/// Worker poll timeout while idle (ms)
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Grace interval granted to pool workers after their queue drained (ms)
pub(crate) const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 1_000;

/// Upper bound on waiting for a dispatcher queue to drain on stop (ms)
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on waiting for a buffered dispatcher to flush on stop (ms)
pub(crate) const DEFAULT_BUFFER_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Sleep increment used while a buffered worker waits out its period (ms)
pub(crate) const DEFAULT_SLEEP_GRANULARITY_MS: u64 = 10;

// -
// Worker thread names

pub(crate) const SINGLE_THREAD_WORKER_PREFIX: &str = "fanout-serial";
pub(crate) const POOL_WORKER_PREFIX: &str = "fanout-pool";
pub(crate) const BUFFERED_WORKER_PREFIX: &str = "fanout-buffer";
pub(crate) const COMPARABLE_WORKER_PREFIX: &str = "fanout-compare";
