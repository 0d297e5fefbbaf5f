//! Session player for replaying a frozen log
//!
//! Playback is a chain of one-shot timers. Each step delivers one sample to
//! the caller's callback and then schedules the next step after the gap that
//! separated the two samples when they were recorded. Only one timer of the
//! chain is pending at any time, and the recorder keeps its handle so that a
//! new recording, [`Recorder::stop`] or [`Recorder::replay`] can cancel it.

use std::sync::{Arc, MutexGuard, Weak};
use std::time::Duration;

use crate::error::{RecorderError, Result};

use super::recorder::{ActivePlayback, Recorder, RecorderInner, Shared, StepSlot};
use super::types::{gap_before, RecorderMode, Sample};

/// Callback receiving `(state, is_final)` for every replayed sample
type StepFn<T> = Box<dyn FnMut(T, bool) + Send + 'static>;

/// One playback run, moved from timer to timer
struct PlaybackRun<T> {
    run_id: u64,
    samples: Arc<Vec<Sample<T>>>,
    /// Index of the sample the next step delivers
    next: usize,
    on_step: StepFn<T>,
    /// Shared with the run's [`ActivePlayback`]
    slot: StepSlot,
}

/// A step handed to the scheduler
///
/// If the scheduler drops it without running it (for instance when the
/// runtime behind it shuts down), the run ends and the failure is kept for
/// [`Recorder::take_playback_error`].
struct QueuedStep<T> {
    shared: Weak<Shared<T>>,
    run: Option<PlaybackRun<T>>,
}

impl<T: Clone + Send + Sync + 'static> QueuedStep<T> {
    fn deliver(mut self) {
        let run = self.run.take();
        if let (Some(shared), Some(run)) = (self.shared.upgrade(), run) {
            deliver_step(&shared, run);
        }
    }
}

impl<T> Drop for QueuedStep<T> {
    fn drop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        if !run.slot.abandon() {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let mut inner = shared.lock();
        if !inner.is_current(run.run_id) {
            return;
        }
        tracing::error!(
            "Playback aborted, step {} was dropped by the scheduler",
            run.next + 1
        );
        inner.playback = None;
        inner.mode = RecorderMode::Idle;
        inner.playback_error = Some(
            RecorderError::SchedulerUnavailable("scheduled step dropped before it ran".to_string())
                .with_context(format!("Failed to deliver step {}", run.next + 1)),
        );
    }
}

/// Divide a recorded gap by the playback speed
fn scaled(gap: Duration, speed: f64) -> Duration {
    if (speed - 1.0).abs() < f64::EPSILON {
        return gap;
    }
    // Whole nanoseconds keep e.g. 150ms / 2.0 at exactly 75ms
    let nanos = (gap.as_nanos() as f64 / speed).round();
    Duration::from_nanos(nanos as u64)
}

impl<T: Clone + Send + Sync + 'static> Recorder<T> {
    /// Replay the last frozen log.
    ///
    /// Each sample is passed to `on_step` as `(state, is_final)`. The first
    /// step is queued with no delay; every later step waits for the gap it had
    /// to its predecessor when recorded. The call itself never blocks and
    /// never invokes `on_step`.
    ///
    /// Because the first step goes through the scheduler, it arrives one
    /// scheduler turn after `play` returns. On a [`TokioScheduler`] that is
    /// the next poll of the runtime; on a [`ManualScheduler`] driven from a
    /// frame loop it is the next `advance` (or `run_next`), typically the
    /// following frame.
    ///
    /// If the scheduler later drops a queued step without running it, the
    /// run ends, the recorder returns to idle and the error is available from
    /// [`Recorder::take_playback_error`].
    ///
    /// Returns `Ok(false)` without side effects when there is nothing to play,
    /// a recording is in progress, or a playback is already running. Returns
    /// an error only if the scheduler refuses the first timer, in which case
    /// the recorder stays idle.
    ///
    /// [`TokioScheduler`]: crate::scheduler::TokioScheduler
    /// [`ManualScheduler`]: crate::scheduler::ManualScheduler
    pub fn play<F>(&self, on_step: F) -> Result<bool>
    where
        F: FnMut(T, bool) + Send + 'static,
    {
        let mut inner = self.shared.lock();
        match inner.mode {
            RecorderMode::Recording => {
                tracing::debug!("play ignored while recording");
                return Ok(false);
            }
            RecorderMode::Playing => {
                tracing::debug!("play ignored, playback already running");
                return Ok(false);
            }
            RecorderMode::Idle => {}
        }

        if inner.log.is_empty() {
            tracing::debug!("Nothing to play");
            return Ok(false);
        }

        let run_id = inner.next_run_id;
        inner.next_run_id += 1;
        let slot = StepSlot::default();
        let run = PlaybackRun {
            run_id,
            samples: inner.log.shared_samples(),
            next: 0,
            on_step: Box::new(on_step),
            slot: slot.clone(),
        };
        let steps = run.samples.len();

        inner.mode = RecorderMode::Playing;
        inner.playback = Some(ActivePlayback {
            run_id,
            timer: None,
            slot,
        });
        inner.playback_error = None;

        if let Err(e) = schedule_step(&self.shared, &mut inner, run, Duration::ZERO) {
            inner.playback = None;
            inner.mode = RecorderMode::Idle;
            tracing::error!("Failed to start playback: {}", e);
            return Err(e.with_context("Failed to start playback"));
        }

        tracing::info!(
            "Playback started: {} steps over {:?}",
            steps,
            scaled(inner.log.duration(), inner.playback_speed)
        );
        Ok(true)
    }

    /// Cancel the running playback, if any.
    ///
    /// Returns true if a playback was cancelled. A step already being
    /// delivered finishes; no later step is delivered.
    pub fn stop(&self) -> bool {
        let mut inner = self.shared.lock();
        if !inner.mode.is_playing() {
            return false;
        }

        let cancelled = inner.cancel_playback();
        if cancelled {
            tracing::info!("Playback stopped");
        }
        cancelled
    }

    /// Cancel any running playback and start a new one from the beginning
    pub fn replay<F>(&self, on_step: F) -> Result<bool>
    where
        F: FnMut(T, bool) + Send + 'static,
    {
        self.stop();
        self.play(on_step)
    }

    /// Take the scheduler error that aborted the last playback, if any
    pub fn take_playback_error(&self) -> Option<RecorderError> {
        self.shared.lock().playback_error.take()
    }
}

/// Queue the step for `run.next` after `delay` and remember its timer
fn schedule_step<T: Clone + Send + Sync + 'static>(
    shared: &Arc<Shared<T>>,
    inner: &mut RecorderInner<T>,
    run: PlaybackRun<T>,
    delay: Duration,
) -> Result<()> {
    let run_id = run.run_id;
    let slot = run.slot.clone();
    let step = QueuedStep {
        shared: Arc::downgrade(shared),
        run: Some(run),
    };

    slot.begin_scheduling();
    let timer = shared
        .scheduler
        .schedule(delay, Box::new(move || step.deliver()))
        .inspect_err(|_| slot.clear())?;

    if !slot.mark_queued() {
        slot.clear();
        timer.cancel();
        return Err(RecorderError::SchedulerUnavailable(
            "scheduled step dropped before it ran".to_string(),
        ));
    }

    match inner.playback.as_mut() {
        Some(playback) if playback.run_id == run_id => playback.timer = Some(timer),
        _ => {
            slot.clear();
            timer.cancel();
        }
    }
    Ok(())
}

fn deliver_step<T: Clone + Send + Sync + 'static>(shared: &Arc<Shared<T>>, mut run: PlaybackRun<T>) {
    let index = run.next;
    let steps = run.samples.len();
    let is_final = index + 1 >= steps;

    if !shared.lock().is_current(run.run_id) {
        tracing::trace!("Dropping stale step {} of run {}", index, run.run_id);
        return;
    }

    tracing::trace!("Playback step {}/{}", index + 1, steps);
    let state = run.samples[index].state.clone();
    (run.on_step)(state, is_final);

    let mut inner: MutexGuard<'_, RecorderInner<T>> = shared.lock();
    if !inner.is_current(run.run_id) {
        tracing::debug!("Playback cancelled during step {}", index + 1);
        return;
    }

    if is_final {
        inner.playback = None;
        inner.mode = RecorderMode::Idle;
        tracing::info!("Playback finished after {} steps", steps);
        return;
    }

    run.next += 1;
    let delay = scaled(gap_before(&run.samples, run.next), inner.playback_speed);
    if let Err(e) = schedule_step(shared, &mut inner, run, delay) {
        tracing::error!("Playback aborted after step {}: {}", index + 1, e);
        inner.playback = None;
        inner.mode = RecorderMode::Idle;
        inner.playback_error = Some(e.with_context(format!("Failed to schedule step {}", index + 2)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ManualScheduler, Scheduler, Task, TimerHandle};
    use std::sync::Mutex;

    type Steps = Arc<Mutex<Vec<(char, bool, Duration)>>>;

    /// Record A at 0ms, B at 100ms, C at 250ms
    fn recorded_abc() -> (Recorder<char>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let recorder = Recorder::new(Arc::new(scheduler.clone()));

        recorder.start_recording();
        recorder.record(&'A');
        scheduler.advance(Duration::from_millis(100));
        recorder.record(&'B');
        scheduler.advance(Duration::from_millis(150));
        recorder.record(&'C');
        recorder.end_recording();

        (recorder, scheduler)
    }

    /// Callback that logs each step with the virtual time since `origin`
    fn step_logger(
        scheduler: &ManualScheduler,
    ) -> (Steps, impl FnMut(char, bool) + Send + 'static) {
        let steps: Steps = Arc::new(Mutex::new(Vec::new()));
        let origin = scheduler.elapsed();
        let clock = scheduler.clone();
        let sink = steps.clone();
        let callback = move |state, is_final| {
            sink.lock()
                .unwrap()
                .push((state, is_final, clock.elapsed() - origin));
        };
        (steps, callback)
    }

    #[test]
    fn test_replays_with_recorded_gaps() {
        let (recorder, scheduler) = recorded_abc();
        let (steps, callback) = step_logger(&scheduler);

        assert!(recorder.play(callback).unwrap());
        assert_eq!(recorder.mode(), RecorderMode::Playing);
        assert!(steps.lock().unwrap().is_empty());

        scheduler.advance(Duration::ZERO);
        scheduler.advance(Duration::from_millis(99));
        assert_eq!(steps.lock().unwrap().len(), 1);

        scheduler.advance(Duration::from_millis(1));
        scheduler.advance(Duration::from_millis(150));

        assert_eq!(
            *steps.lock().unwrap(),
            vec![
                ('A', false, Duration::ZERO),
                ('B', false, Duration::from_millis(100)),
                ('C', true, Duration::from_millis(250)),
            ]
        );
        assert_eq!(recorder.mode(), RecorderMode::Idle);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_single_sample_is_final() {
        let scheduler = ManualScheduler::new();
        let recorder = Recorder::new(Arc::new(scheduler.clone()));
        recorder.start_recording();
        recorder.record(&'X');
        recorder.end_recording();

        let (steps, callback) = step_logger(&scheduler);
        assert!(recorder.play(callback).unwrap());
        scheduler.advance(Duration::ZERO);

        assert_eq!(*steps.lock().unwrap(), vec![('X', true, Duration::ZERO)]);
        assert_eq!(recorder.mode(), RecorderMode::Idle);
    }

    #[test]
    fn test_empty_log_plays_nothing() {
        let scheduler = ManualScheduler::new();
        let recorder: Recorder<char> = Recorder::new(Arc::new(scheduler.clone()));

        let (steps, callback) = step_logger(&scheduler);
        assert!(!recorder.play(callback).unwrap());

        recorder.start_recording();
        recorder.end_recording();
        let (_, callback) = step_logger(&scheduler);
        assert!(!recorder.play(callback).unwrap());

        scheduler.advance(Duration::from_secs(1));
        assert!(steps.lock().unwrap().is_empty());
        assert_eq!(recorder.mode(), RecorderMode::Idle);
    }

    #[test]
    fn test_play_rejected_while_recording() {
        let scheduler = ManualScheduler::new();
        let recorder = Recorder::new(Arc::new(scheduler.clone()));
        recorder.start_recording();
        recorder.record(&'A');

        let (steps, callback) = step_logger(&scheduler);
        assert!(!recorder.play(callback).unwrap());
        assert_eq!(recorder.mode(), RecorderMode::Recording);

        scheduler.advance(Duration::from_secs(1));
        assert!(steps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_second_play_does_not_interleave() {
        let (recorder, scheduler) = recorded_abc();
        let (first, callback) = step_logger(&scheduler);
        let (second, other_callback) = step_logger(&scheduler);

        assert!(recorder.play(callback).unwrap());
        assert!(!recorder.play(other_callback).unwrap());

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(first.lock().unwrap().len(), 3);
        assert!(second.lock().unwrap().is_empty());
    }

    #[test]
    fn test_start_recording_cancels_playback() {
        let (recorder, scheduler) = recorded_abc();
        let (steps, callback) = step_logger(&scheduler);

        recorder.play(callback).unwrap();
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(steps.lock().unwrap().len(), 2);

        recorder.start_recording();
        assert_eq!(recorder.mode(), RecorderMode::Recording);
        assert_eq!(scheduler.pending(), 0);

        scheduler.advance(Duration::from_secs(1));
        let delivered: Vec<char> = steps.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(delivered, vec!['A', 'B']);
        assert_eq!(recorder.mode(), RecorderMode::Recording);
    }

    #[test]
    fn test_stop_cancels_pending_step() {
        let (recorder, scheduler) = recorded_abc();
        let (steps, callback) = step_logger(&scheduler);

        recorder.play(callback).unwrap();
        scheduler.advance(Duration::ZERO);
        assert!(recorder.stop());
        assert!(!recorder.stop());
        assert_eq!(recorder.mode(), RecorderMode::Idle);

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(steps.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_from_inside_callback() {
        let (recorder, scheduler) = recorded_abc();
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let handle = recorder.clone();
        let sink = delivered.clone();
        recorder
            .play(move |state, _| {
                sink.lock().unwrap().push(state);
                if state == 'B' {
                    handle.stop();
                }
            })
            .unwrap();

        scheduler.advance(Duration::from_secs(1));
        assert_eq!(*delivered.lock().unwrap(), vec!['A', 'B']);
        assert_eq!(recorder.mode(), RecorderMode::Idle);
    }

    #[test]
    fn test_record_during_playback_is_ignored() {
        let (recorder, scheduler) = recorded_abc();
        let handle = recorder.clone();

        recorder
            .play(move |state, _| {
                // Viewer echoes the replayed state back as a change event
                handle.record(&state);
            })
            .unwrap();
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(recorder.sample_count(), 3);
    }

    #[test]
    fn test_replay_restarts_from_beginning() {
        let (recorder, scheduler) = recorded_abc();
        let (first, callback) = step_logger(&scheduler);
        recorder.play(callback).unwrap();
        scheduler.advance(Duration::from_millis(100));

        let (second, callback) = step_logger(&scheduler);
        assert!(recorder.replay(callback).unwrap());
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(first.lock().unwrap().len(), 2);
        let delivered: Vec<char> = second.lock().unwrap().iter().map(|s| s.0).collect();
        assert_eq!(delivered, vec!['A', 'B', 'C']);
    }

    #[test]
    fn test_playback_speed_scales_gaps() {
        let (recorder, scheduler) = recorded_abc();
        recorder.set_playback_speed(2.0);
        let (steps, callback) = step_logger(&scheduler);

        recorder.play(callback).unwrap();
        scheduler.advance(Duration::from_secs(1));

        let times: Vec<Duration> = steps.lock().unwrap().iter().map(|s| s.2).collect();
        assert_eq!(
            times,
            vec![
                Duration::ZERO,
                Duration::from_millis(50),
                Duration::from_millis(125),
            ]
        );
    }

    #[test]
    fn test_scheduler_failure_on_play() {
        let (recorder, scheduler) = recorded_abc();
        scheduler.shutdown();
        let (steps, callback) = step_logger(&scheduler);

        let err = recorder.play(callback).unwrap_err();
        assert!(err.is_scheduler_unavailable());
        assert_eq!(recorder.mode(), RecorderMode::Idle);
        assert!(steps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_scheduler_failure_mid_playback() {
        let (recorder, scheduler) = recorded_abc();
        let (steps, callback) = step_logger(&scheduler);

        recorder.play(callback).unwrap();
        scheduler.shutdown();
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(steps.lock().unwrap().len(), 1);
        assert_eq!(recorder.mode(), RecorderMode::Idle);
        let err = recorder.take_playback_error().unwrap();
        assert!(err.is_scheduler_unavailable());
        assert!(recorder.take_playback_error().is_none());
    }

    #[test]
    fn test_identical_timestamps_both_replayed() {
        let scheduler = ManualScheduler::new();
        let recorder = Recorder::new(Arc::new(scheduler.clone()));
        recorder.start_recording();
        recorder.record(&'A');
        recorder.record(&'B');
        recorder.end_recording();

        let (steps, callback) = step_logger(&scheduler);
        recorder.play(callback).unwrap();
        scheduler.advance(Duration::ZERO);

        assert_eq!(
            *steps.lock().unwrap(),
            vec![('A', false, Duration::ZERO), ('B', true, Duration::ZERO)]
        );
    }

    /// Accepts every timer but only ever drops the tasks
    #[derive(Default)]
    struct DroppingScheduler {
        tasks: Mutex<Vec<Task>>,
    }

    impl DroppingScheduler {
        fn drop_all(&self) {
            let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
            drop(tasks);
        }
    }

    impl Scheduler for DroppingScheduler {
        fn now(&self) -> std::time::Instant {
            std::time::Instant::now()
        }

        fn schedule(&self, _delay: Duration, task: Task) -> Result<TimerHandle> {
            self.tasks.lock().unwrap().push(task);
            Ok(TimerHandle::new())
        }
    }

    fn recorded_on(scheduler: &Arc<DroppingScheduler>) -> Recorder<char> {
        let recorder = Recorder::new(scheduler.clone());
        recorder.start_recording();
        recorder.record(&'A');
        recorder.record(&'B');
        recorder.end_recording();
        recorder
    }

    #[test]
    fn test_dropped_step_ends_playback() {
        let scheduler = Arc::new(DroppingScheduler::default());
        let recorder = recorded_on(&scheduler);
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();

        assert!(recorder.play(move |_, _| *c.lock().unwrap() += 1).unwrap());
        assert!(recorder.is_playing());

        scheduler.drop_all();

        assert_eq!(recorder.mode(), RecorderMode::Idle);
        assert_eq!(*calls.lock().unwrap(), 0);
        let err = recorder.take_playback_error().unwrap();
        assert!(err.is_scheduler_unavailable());

        // The recorder is usable again
        assert!(recorder.play(|_, _| {}).unwrap());
    }

    #[test]
    fn test_dropping_cancelled_step_is_silent() {
        let scheduler = Arc::new(DroppingScheduler::default());
        let recorder = recorded_on(&scheduler);

        recorder.play(|_, _| {}).unwrap();
        assert!(recorder.stop());
        scheduler.drop_all();

        assert_eq!(recorder.mode(), RecorderMode::Idle);
        assert!(recorder.take_playback_error().is_none());
    }
}
