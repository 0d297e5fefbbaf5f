//! Scheduler backed by a tokio runtime

use std::time::{Duration, Instant};

use tokio::runtime::Handle;

use crate::error::{RecorderError, Result};

use super::{Scheduler, Task, TimerHandle};

/// Runs deferred tasks as sleeping tokio tasks
///
/// Time is read through `tokio::time::Instant`, so a paused test runtime
/// drives both recording timestamps and playback delays.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Create a scheduler on an explicit runtime handle
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler on the runtime the caller is running in
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| RecorderError::SchedulerUnavailable(e.to_string()))
    }

    /// The runtime handle tasks are spawned on
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        let _guard = self.handle.enter();
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: Task) -> Result<TimerHandle> {
        let timer = TimerHandle::new();
        let guarded = timer.guard(task);

        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            guarded();
        });

        // A shut-down runtime drops the task inside `spawn`
        if join.is_finished() && timer.is_pending() {
            timer.cancel();
            return Err(RecorderError::SchedulerUnavailable(
                "tokio runtime is shut down".to_string(),
            ));
        }
        timer.set_abort(join.abort_handle());

        tracing::trace!("Scheduled timer in {:?}", delay);
        Ok(timer)
    }
}
