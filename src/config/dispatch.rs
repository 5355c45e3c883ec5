use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use super::ensure_positive;
use crate::constants::DEFAULT_BUFFER_DRAIN_CAP;
use crate::constants::DEFAULT_BUFFER_SHUTDOWN_TIMEOUT_MS;
use crate::constants::DEFAULT_POLL_INTERVAL_MS;
use crate::constants::DEFAULT_POOL_QUEUE_CAPACITY;
use crate::constants::DEFAULT_SHUTDOWN_GRACE_MS;
use crate::constants::DEFAULT_SHUTDOWN_TIMEOUT_MS;
use crate::constants::DEFAULT_SLEEP_GRANULARITY_MS;
use crate::Result;

/// Tuning parameters for every dispatcher policy
///
/// None of these change delivery semantics: queue bounds of the unbounded
/// policies are not configurable.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DispatchConfig {
    /// Settings of the single-thread (serial) dispatcher
    #[serde(default)]
    pub single_thread: SingleThreadConfig,

    /// Settings of the multi-thread pool dispatcher
    #[serde(default)]
    pub thread_pool: ThreadPoolConfig,

    /// Settings of the time-windowed batch dispatcher
    #[serde(default)]
    pub buffered: BufferedConfig,
}

impl DispatchConfig {
    /// Validates all dispatcher configurations
    pub fn validate(&self) -> Result<()> {
        self.single_thread.validate()?;
        self.thread_pool.validate()?;
        self.buffered.validate()?;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SingleThreadConfig {
    /// How long an idle worker blocks on its queue before re-checking
    /// the shutdown flag
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Upper bound `stop()` waits for the queue to drain
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl Default for SingleThreadConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl SingleThreadConfig {
    fn validate(&self) -> Result<()> {
        ensure_positive(self.poll_interval_ms, "single_thread.poll_interval_ms")?;
        ensure_positive(self.shutdown_timeout_ms, "single_thread.shutdown_timeout_ms")?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThreadPoolConfig {
    /// Capacity of the shared task queue
    ///
    /// When full, the cache-mutation thread blocks until a worker frees a
    /// slot. This is the only producer backpressure point of the engine.
    ///
    /// **Default**: 10000
    #[serde(default = "default_pool_queue_capacity")]
    pub queue_capacity: usize,

    /// Worker poll timeout on the shared queue
    #[serde(default = "default_poll_interval")]
    pub poll_timeout_ms: u64,

    /// Upper bound `stop()` waits for the shared queue to empty
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,

    /// Fixed grace interval granted to in-flight workers once the queue is empty
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_pool_queue_capacity(),
            poll_timeout_ms: default_poll_interval(),
            shutdown_timeout_ms: default_shutdown_timeout(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl ThreadPoolConfig {
    fn validate(&self) -> Result<()> {
        ensure_positive(self.queue_capacity as u64, "thread_pool.queue_capacity")?;
        ensure_positive(self.poll_timeout_ms, "thread_pool.poll_timeout_ms")?;
        ensure_positive(self.shutdown_timeout_ms, "thread_pool.shutdown_timeout_ms")?;
        ensure_positive(self.shutdown_grace_ms, "thread_pool.shutdown_grace_ms")?;
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BufferedConfig {
    /// Hard cap on notifications drained from each queue per flush cycle
    ///
    /// **Default**: 20000
    #[serde(default = "default_buffer_drain_cap")]
    pub drain_cap: usize,

    /// Sleep increment while waiting out the remainder of a flush period
    ///
    /// Bounds how late a cycle may start relative to its period.
    #[serde(default = "default_sleep_granularity")]
    pub sleep_granularity_ms: u64,

    /// Upper bound `stop()` waits for the final flushes
    #[serde(default = "default_buffer_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl Default for BufferedConfig {
    fn default() -> Self {
        Self {
            drain_cap: default_buffer_drain_cap(),
            sleep_granularity_ms: default_sleep_granularity(),
            shutdown_timeout_ms: default_buffer_shutdown_timeout(),
        }
    }
}

impl BufferedConfig {
    fn validate(&self) -> Result<()> {
        ensure_positive(self.drain_cap as u64, "buffered.drain_cap")?;
        ensure_positive(self.sleep_granularity_ms, "buffered.sleep_granularity_ms")?;
        ensure_positive(self.shutdown_timeout_ms, "buffered.shutdown_timeout_ms")?;

        if self.sleep_granularity_ms > 1_000 {
            warn!(
                "buffered.sleep_granularity_ms ({}) exceeds one second; flush cycles may start late",
                self.sleep_granularity_ms
            );
        }
        Ok(())
    }

    pub fn sleep_granularity(&self) -> Duration {
        Duration::from_millis(self.sleep_granularity_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_shutdown_timeout() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}
fn default_shutdown_grace() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}
fn default_pool_queue_capacity() -> usize {
    DEFAULT_POOL_QUEUE_CAPACITY
}
fn default_buffer_drain_cap() -> usize {
    DEFAULT_BUFFER_DRAIN_CAP
}
fn default_sleep_granularity() -> u64 {
    DEFAULT_SLEEP_GRANULARITY_MS
}
fn default_buffer_shutdown_timeout() -> u64 {
    DEFAULT_BUFFER_SHUTDOWN_TIMEOUT_MS
}
