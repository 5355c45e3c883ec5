//! Delivery policies decoupling cache-mutation threads from listener threads.
//!
//! ```text
//! Cache::put (mutation thread)
//!   └─ CacheListener::on_update ── Synchronous ──────────► listener
//!                               ├─ SingleThread: unbounded queue ─► 1 worker ─► listener
//!                               ├─ MultiThread:  bounded queue ───► N workers ─► listener
//!                               └─ Buffered:     2 unbounded queues ─► periodic flush ─► bulk listener
//! ```
//!
//! Only the multi-thread pool can block the producer (on a full queue). A
//! failing or panicking listener call is logged by the dispatcher and never
//! kills a worker or reaches the producer.

mod buffered;
mod comparable;
mod lifecycle;
mod single_thread;
mod synchronous;
mod thread_pool;
mod worker;

pub use buffered::*;
pub use comparable::*;
pub use lifecycle::*;
pub use single_thread::*;
pub use synchronous::*;
pub use thread_pool::*;

#[cfg(test)]
mod buffered_test;

use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::ListenerError;
use crate::ListenerResult;
use crate::Result;

/// Start/stop control over a registered dispatcher
pub trait Lifecycle: Send + Sync {
    /// Name used in logs and thread names
    fn name(&self) -> &str;

    /// Spawns the worker thread(s). Idempotent while running; fails once stopped.
    fn start(&self) -> Result<()>;

    /// Drains queued notifications, then terminates the workers. Waits are
    /// bounded and in-flight listener calls are never interrupted. Idempotent.
    fn stop(&self);

    fn is_running(&self) -> bool;

    fn state(&self) -> LifecycleState;
}

/// Handle returned by registration, used to stop the dispatcher later
pub type DispatcherHandle = Arc<dyn Lifecycle>;

/// Runs one listener call, turning a panic into a [`ListenerError::Panicked`]
pub(crate) fn isolate<F>(call: F) -> ListenerResult
where
    F: FnOnce() -> ListenerResult,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::from_panic(payload)),
    }
}
