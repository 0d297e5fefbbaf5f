//! Scheduler with a virtual clock driven by the host

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{RecorderError, Result};

use super::{Scheduler, Task, TimerHandle};

struct Entry {
    due: Duration,
    seq: u64,
    timer: TimerHandle,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the BinaryHeap pops the earliest (due, seq) first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct ManualInner {
    origin: Instant,
    elapsed: Duration,
    queue: BinaryHeap<Entry>,
    next_seq: u64,
    shut_down: bool,
}

/// Scheduler whose clock only moves when told to
///
/// Tasks run on the thread that calls [`advance`](Self::advance), in
/// due-time order, ties broken by the order they were scheduled. A task may
/// schedule further tasks; those run in the same `advance` call if they fall
/// inside the advanced window.
#[derive(Clone)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualInner>>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ManualScheduler")
            .field("elapsed", &inner.elapsed)
            .field("queued", &inner.queue.len())
            .field("shut_down", &inner.shut_down)
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler with its clock at zero
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner {
                origin: Instant::now(),
                elapsed: Duration::ZERO,
                queue: BinaryHeap::new(),
                next_seq: 0,
                shut_down: false,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Virtual time since the scheduler was created
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed
    }

    /// Number of tasks still waiting to run (cancelled ones excluded)
    pub fn pending(&self) -> usize {
        self.lock()
            .queue
            .iter()
            .filter(|entry| entry.timer.is_pending())
            .count()
    }

    /// Stop accepting new timers. Already queued tasks still run.
    pub fn shutdown(&self) {
        self.lock().shut_down = true;
    }

    /// Pop the next task due at or before `limit`, moving the clock to it
    fn pop_due(&self, limit: Duration) -> Option<Entry> {
        let mut inner = self.lock();
        loop {
            let due = inner.queue.peek()?.due;
            if due > limit {
                return None;
            }
            let entry = inner.queue.pop()?;
            if entry.timer.is_cancelled() {
                continue;
            }
            inner.elapsed = inner.elapsed.max(entry.due);
            return Some(entry);
        }
    }

    /// Advance the clock by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().elapsed + by;
        let mut ran = 0;

        while let Some(entry) = self.pop_due(target) {
            (entry.task)();
            ran += 1;
        }

        let mut inner = self.lock();
        inner.elapsed = inner.elapsed.max(target);
        ran
    }

    /// Jump to the next queued task and run it.
    ///
    /// Returns the virtual time the task ran at, or `None` if nothing is queued.
    pub fn run_next(&self) -> Option<Duration> {
        let entry = self.pop_due(Duration::MAX)?;
        let at = entry.due;
        (entry.task)();
        Some(at)
    }

    /// Run queued tasks until none remain.
    ///
    /// A task that always reschedules itself keeps this from returning, so
    /// `max_tasks` bounds the loop. Returns the number of tasks run.
    pub fn run_until_idle(&self, max_tasks: usize) -> usize {
        let mut ran = 0;
        while ran < max_tasks && self.run_next().is_some() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        let inner = self.lock();
        inner.origin + inner.elapsed
    }

    fn schedule(&self, delay: Duration, task: Task) -> Result<TimerHandle> {
        let mut inner = self.lock();
        if inner.shut_down {
            return Err(RecorderError::SchedulerUnavailable(
                "manual scheduler has been shut down".to_string(),
            ));
        }

        let timer = TimerHandle::new();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let due = inner.elapsed + delay;
        inner.queue.push(Entry {
            due,
            seq,
            timer: timer.clone(),
            task: timer.guard(task),
        });

        Ok(timer)
    }
}
