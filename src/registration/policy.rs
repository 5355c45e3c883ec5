use std::fmt;
use std::time::Duration;

use crate::Error;
use crate::Result;

/// How notifications reach a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Called directly on the cache-mutation thread
    Synchronous,
    /// One dedicated worker, FIFO, never blocks the cache
    SingleThreaded,
    /// `threads` workers over a bounded queue, unordered, blocks the cache when full
    MultiThreaded { threads: usize },
    /// Batched per kind and flushed every `period`
    Buffered { period: Duration },
}

impl DeliveryPolicy {
    pub fn multi_threaded(threads: usize) -> Self {
        DeliveryPolicy::MultiThreaded { threads }
    }

    pub fn buffered_millis(period_ms: u64) -> Self {
        DeliveryPolicy::Buffered {
            period: Duration::from_millis(period_ms),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            DeliveryPolicy::MultiThreaded { threads: 0 } => Err(Error::InvalidConfig(
                "multi-threaded policy needs at least one thread".into(),
            )),
            DeliveryPolicy::Buffered { period } if period.is_zero() => Err(Error::InvalidConfig(
                "buffered policy needs a flush period greater than 0".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Short name used to build dispatcher names
    pub(crate) fn label(&self) -> &'static str {
        match self {
            DeliveryPolicy::Synchronous => "synchronous",
            DeliveryPolicy::SingleThreaded => "single-thread",
            DeliveryPolicy::MultiThreaded { .. } => "thread-pool",
            DeliveryPolicy::Buffered { .. } => "buffered",
        }
    }
}

impl fmt::Display for DeliveryPolicy {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DeliveryPolicy::MultiThreaded { threads } => write!(f, "{}({})", self.label(), threads),
            DeliveryPolicy::Buffered { period } => write!(f, "{}({}ms)", self.label(), period.as_millis()),
            _ => write!(f, "{}", self.label()),
        }
    }
}
