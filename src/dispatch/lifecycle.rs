use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use parking_lot::RwLock;
use tracing::debug;

use crate::DispatchError;
use crate::Result;

/// Dispatcher lifecycle: `Created -> Running -> Draining -> Stopped`
///
/// Workers are alive only in `Running` and `Draining`. Dispatchers are
/// single-use: there is no transition out of `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Created = 0,
    Running = 1,
    Draining = 2,
    Stopped = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Created,
            1 => LifecycleState::Running,
            2 => LifecycleState::Draining,
            _ => LifecycleState::Stopped,
        }
    }
}

/// Atomic holder of a [`LifecycleState`], polled by workers without further
/// synchronization
///
/// Producers go through [`LifecycleCell::admit`], which holds the shared side
/// of `gate` across the state check and the send. Start and the
/// `Running -> Draining` transition take the exclusive side, so once
/// `begin_stop` returns no producer is between its check and its send.
#[derive(Debug)]
pub(crate) struct LifecycleCell {
    state: AtomicU8,
    gate: RwLock<()>,
}

impl LifecycleCell {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Created as u8),
            gate: RwLock::new(()),
        }
    }

    pub(crate) fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.get() == LifecycleState::Running
    }

    /// Claims the `Created -> Running` transition
    ///
    /// Returns `Ok(true)` for the single caller that must spawn workers,
    /// `Ok(false)` when already started.
    pub(crate) fn try_start(
        &self,
        dispatcher: &str,
    ) -> Result<bool> {
        match self.state.compare_exchange(
            LifecycleState::Created as u8,
            LifecycleState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!(dispatcher, "Dispatcher started");
                Ok(true)
            }
            Err(current) => match LifecycleState::from_u8(current) {
                LifecycleState::Stopped => Err(DispatchError::AlreadyStopped {
                    dispatcher: dispatcher.to_string(),
                }
                .into()),
                _ => Ok(false),
            },
        }
    }

    /// Claims the `Created -> Running` transition and runs `spawn` before any
    /// stop can begin
    ///
    /// A failing `spawn` leaves the dispatcher `Stopped`.
    pub(crate) fn start_with<F>(
        &self,
        dispatcher: &str,
        spawn: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let _exclusive = self.gate.write();
        if !self.try_start(dispatcher)? {
            return Ok(());
        }
        if let Err(e) = spawn() {
            self.finish_stop(dispatcher);
            return Err(e);
        }
        Ok(())
    }

    /// Claims the `Running -> Draining` transition
    ///
    /// Returns `true` for the single caller that must drain and join workers.
    /// A dispatcher that was never started goes straight to `Stopped`.
    pub(crate) fn begin_stop(
        &self,
        dispatcher: &str,
    ) -> bool {
        let _exclusive = self.gate.write();
        if self
            .state
            .compare_exchange(
                LifecycleState::Running as u8,
                LifecycleState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(dispatcher, "Dispatcher draining");
            return true;
        }

        let _ = self.state.compare_exchange(
            LifecycleState::Created as u8,
            LifecycleState::Stopped as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        false
    }

    pub(crate) fn finish_stop(
        &self,
        dispatcher: &str,
    ) {
        self.state.store(LifecycleState::Stopped as u8, Ordering::Release);
        debug!(dispatcher, "Dispatcher stopped");
    }

    /// Rejects notifications unless the dispatcher is running
    pub(crate) fn ensure_running(
        &self,
        dispatcher: &str,
    ) -> Result<()> {
        let state = self.get();
        if state != LifecycleState::Running {
            return Err(DispatchError::NotRunning {
                dispatcher: dispatcher.to_string(),
                state,
            }
            .into());
        }
        Ok(())
    }

    /// Runs `send` only while running, excluding a concurrent stop
    ///
    /// `send` must not call back into this cell.
    pub(crate) fn admit<F>(
        &self,
        dispatcher: &str,
        send: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let _shared = self.gate.read();
        self.ensure_running(dispatcher)?;
        send()
    }
}
