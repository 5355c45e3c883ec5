//! Cache Fan-out Error Hierarchy
//!
//! Defines the error types surfaced by caches, dispatchers and listeners,
//! categorized by who is expected to handle them:
//!
//! - [`DispatchError`]: producer/consumer lifecycle mismatches. These reach the
//!   cache-mutation thread and indicate a programming-contract violation.
//! - [`ListenerError`]: failures raised by a listener callback. These never
//!   leave a worker thread; dispatchers log them and keep going.

use std::time::Duration;

use config::ConfigError;

use crate::CacheCategory;
use crate::EntityId;
use crate::LifecycleState;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by listener callbacks
pub type ListenerResult = std::result::Result<(), ListenerError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dispatcher lifecycle failures
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Failure reported by a synchronously invoked listener
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration or registration parameters that failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// No cache attached for the requested category
    #[error("No cache registered for category {0:?}")]
    UnknownCache(CacheCategory),

    /// The cache holds no entity with this id
    #[error("Entity {0} not found in cache")]
    EntityNotFound(EntityId),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Notification received while the dispatcher is not accepting work
    #[error("Dispatcher {dispatcher} is not running (state: {state:?})")]
    NotRunning {
        dispatcher: String,
        state: LifecycleState,
    },

    /// Dispatchers are single-use: a stopped dispatcher cannot be restarted
    #[error("Dispatcher {dispatcher} was stopped and cannot be restarted")]
    AlreadyStopped { dispatcher: String },

    /// All workers are gone while the dispatcher still reports running
    #[error("Task queue of dispatcher {dispatcher} is disconnected")]
    QueueDisconnected { dispatcher: String },

    /// The OS refused to spawn a worker thread
    #[error("Failed to spawn worker thread for {dispatcher}")]
    WorkerSpawn {
        dispatcher: String,
        #[source]
        source: std::io::Error,
    },

    /// Shutdown waited for its full bound without the workers finishing
    #[error("Dispatcher {dispatcher} did not shut down within {waited:?} ({pending} notifications still queued)")]
    ShutdownTimeout {
        dispatcher: String,
        waited: Duration,
        pending: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listener refused the notification
    #[error("Listener rejected notification: {0}")]
    Rejected(String),

    /// A downstream system used by the listener failed
    #[error("Downstream failure: {0}")]
    Downstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The listener callback panicked; captured by the dispatcher
    #[error("Listener panicked: {0}")]
    Panicked(String),
}

impl ListenerError {
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ListenerError::Panicked(message)
    }
}

impl Error {
    /// True when the error reports a notification sent to a dispatcher that
    /// is not running.
    pub fn is_not_running(&self) -> bool {
        matches!(self, Error::Dispatch(DispatchError::NotRunning { .. }))
    }
}
