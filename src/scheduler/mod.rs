//! Deferred, cancellable task scheduling
//!
//! Playback and the look-around animation never block the caller. Each
//! future step is handed to a [`Scheduler`] together with a delay, and the
//! returned [`TimerHandle`] is the only thing needed to tear it down again.
//!
//! # Implementations
//!
//! - [`TokioScheduler`] - Spawns a sleeping task on a tokio runtime
//! - [`ManualScheduler`] - Virtual clock advanced explicitly by the host,
//!   for frame loops and deterministic tests
//!
//! # Cancellation
//!
//! Cancelling is cooperative: once [`TimerHandle::cancel`] returns, the task
//! will not start. A task that has already started is left to finish.

pub mod manual;
pub mod runtime;

pub use self::manual::ManualScheduler;
pub use self::runtime::TokioScheduler;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::Result;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of time and deferred execution
pub trait Scheduler: Send + Sync {
    /// Current time as seen by this scheduler
    fn now(&self) -> Instant;

    /// Run `task` once after `delay`.
    ///
    /// Fails with [`RecorderError::SchedulerUnavailable`](crate::RecorderError::SchedulerUnavailable)
    /// when the underlying primitive cannot take the timer.
    fn schedule(&self, delay: Duration, task: Task) -> Result<TimerHandle>;
}

/// Lifecycle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// Waiting for its deadline
    Pending,
    /// Deadline reached, task executing
    Running,
    /// Task ran to completion
    Finished,
    /// Cancelled before it started
    Cancelled,
}

#[derive(Debug)]
struct TimerState {
    phase: TimerPhase,
    abort: Option<tokio::task::AbortHandle>,
}

/// Handle to a scheduled task
///
/// Cloning the handle shares the same timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    state: Arc<Mutex<TimerState>>,
}

impl TimerHandle {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState {
                phase: TimerPhase::Pending,
                abort: None,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the task if it has not started yet.
    ///
    /// Returns true if this call prevented the task from running.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        if state.phase != TimerPhase::Pending {
            return false;
        }
        state.phase = TimerPhase::Cancelled;
        if let Some(abort) = state.abort.take() {
            abort.abort();
        }
        true
    }

    /// Current phase of the task
    pub fn phase(&self) -> TimerPhase {
        self.lock().phase
    }

    /// Check if the task was cancelled before it ran
    pub fn is_cancelled(&self) -> bool {
        self.phase() == TimerPhase::Cancelled
    }

    /// Check if the task is still waiting for its deadline
    pub fn is_pending(&self) -> bool {
        self.phase() == TimerPhase::Pending
    }

    /// Attach the runtime handle used to drop the sleeping task on cancel
    pub(crate) fn set_abort(&self, abort: tokio::task::AbortHandle) {
        let mut state = self.lock();
        if state.phase == TimerPhase::Cancelled {
            abort.abort();
        } else if state.phase == TimerPhase::Pending {
            state.abort = Some(abort);
        }
    }

    /// Move Pending -> Running. False if the task was cancelled.
    fn begin(&self) -> bool {
        let mut state = self.lock();
        if state.phase != TimerPhase::Pending {
            return false;
        }
        state.phase = TimerPhase::Running;
        state.abort = None;
        true
    }

    fn finish(&self) {
        self.lock().phase = TimerPhase::Finished;
    }

    /// Wrap `task` so that it only runs if this handle was not cancelled
    pub(crate) fn guard(&self, task: Task) -> Task {
        let handle = self.clone();
        Box::new(move || {
            if handle.begin() {
                task();
                handle.finish();
            }
        })
    }
}
