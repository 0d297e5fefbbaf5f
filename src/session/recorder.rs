//! Session recorder for capturing viewer state changes

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::RecorderSettings;
use crate::error::RecorderError;
use crate::scheduler::{Scheduler, TimerHandle};

use super::types::{RecordLog, RecorderMode};

/// Lowest accepted playback speed multiplier
pub const MIN_PLAYBACK_SPEED: f64 = 0.1;

/// Highest accepted playback speed multiplier
pub const MAX_PLAYBACK_SPEED: f64 = 10.0;

/// Bookkeeping for the playback run currently in flight
#[derive(Debug)]
pub(super) struct ActivePlayback {
    /// Identifies the run; steps from any other run are stale
    pub(super) run_id: u64,
    /// Timer for the next step, if one is queued
    pub(super) timer: Option<TimerHandle>,
    /// Tracks the step of this run that sits on the scheduler
    pub(super) slot: StepSlot,
}

/// Hand-off state of the one queued step of a playback run
///
/// The scheduler may drop a step without running it. Whoever sees the drop
/// must end the run, but the drop can happen inside `schedule` while the
/// recorder lock is held, so the state decides who reports it.
#[derive(Debug, Clone, Default)]
pub(super) struct StepSlot(Arc<AtomicU8>);

const SLOT_IDLE: u8 = 0;
const SLOT_SCHEDULING: u8 = 1;
const SLOT_QUEUED: u8 = 2;
const SLOT_DROPPED: u8 = 3;

impl StepSlot {
    /// About to hand a step to the scheduler
    pub(super) fn begin_scheduling(&self) {
        self.0.store(SLOT_SCHEDULING, Ordering::SeqCst);
    }

    /// The scheduler accepted the step. False if it was already dropped.
    pub(super) fn mark_queued(&self) -> bool {
        self.0
            .compare_exchange(SLOT_SCHEDULING, SLOT_QUEUED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// No step of this run is pending anymore
    pub(super) fn clear(&self) {
        self.0.store(SLOT_IDLE, Ordering::SeqCst);
    }

    /// Called when a step is dropped unrun.
    ///
    /// Returns true if the caller must end the run. While scheduling, the
    /// drop is left to the scheduling side, which sees it in `mark_queued`.
    pub(super) fn abandon(&self) -> bool {
        if self
            .0
            .compare_exchange(SLOT_SCHEDULING, SLOT_DROPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return false;
        }
        self.0
            .compare_exchange(SLOT_QUEUED, SLOT_IDLE, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[derive(Debug)]
pub(super) struct RecorderInner<T> {
    /// Current recorder mode
    pub(super) mode: RecorderMode,
    /// Log being written, or the last frozen one
    pub(super) log: RecordLog<T>,
    /// Active playback run
    pub(super) playback: Option<ActivePlayback>,
    /// Id handed to the next playback run
    pub(super) next_run_id: u64,
    /// Playback speed multiplier (1.0 = original timing)
    pub(super) playback_speed: f64,
    /// Maximum number of samples per session (0 = unlimited)
    pub(super) max_samples: usize,
    /// Scheduler failure hit by a playback step after `play` returned
    pub(super) playback_error: Option<RecorderError>,
}

impl<T> RecorderInner<T> {
    /// Check if `run_id` is the playback run currently in flight
    pub(super) fn is_current(&self, run_id: u64) -> bool {
        self.mode.is_playing()
            && self
                .playback
                .as_ref()
                .is_some_and(|playback| playback.run_id == run_id)
    }

    /// Drop the active playback and its pending timer.
    ///
    /// Returns true if a playback was active.
    pub(super) fn cancel_playback(&mut self) -> bool {
        let Some(playback) = self.playback.take() else {
            return false;
        };
        playback.slot.clear();
        if let Some(timer) = playback.timer {
            timer.cancel();
        }
        self.mode = RecorderMode::Idle;
        true
    }
}

pub(super) struct Shared<T> {
    pub(super) scheduler: Arc<dyn Scheduler>,
    pub(super) inner: Mutex<RecorderInner<T>>,
}

impl<T> Shared<T> {
    pub(super) fn lock(&self) -> MutexGuard<'_, RecorderInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Records timestamped state snapshots and replays them with their timing
///
/// The recorder is a cheap handle: clones share one session, so a clone can
/// be registered with the viewer's change notifications while another drives
/// the UI. The internal lock is never held while user callbacks run.
pub struct Recorder<T> {
    pub(super) shared: Arc<Shared<T>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("Recorder")
            .field("mode", &inner.mode)
            .field("samples", &inner.log.len())
            .field("playback_speed", &inner.playback_speed)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Recorder<T> {
    /// Create a new recorder using `scheduler` for time and timers
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        let log = RecordLog::empty_frozen(scheduler.now());
        Self {
            shared: Arc::new(Shared {
                scheduler,
                inner: Mutex::new(RecorderInner {
                    mode: RecorderMode::Idle,
                    log,
                    playback: None,
                    next_run_id: 0,
                    playback_speed: 1.0,
                    max_samples: 0,
                    playback_error: None,
                }),
            }),
        }
    }

    /// Create a recorder configured from settings
    pub fn with_settings(scheduler: Arc<dyn Scheduler>, settings: &RecorderSettings) -> Self {
        let recorder = Self::new(scheduler);
        recorder.set_max_samples(settings.max_samples);
        recorder.set_playback_speed(settings.playback_speed);
        recorder
    }

    /// Set maximum number of samples per session (0 = unlimited)
    pub fn set_max_samples(&self, max: usize) {
        self.shared.lock().max_samples = max;
    }

    /// Get playback speed
    pub fn playback_speed(&self) -> f64 {
        self.shared.lock().playback_speed
    }

    /// Set playback speed. Applies to steps scheduled after the call.
    pub fn set_playback_speed(&self, speed: f64) {
        let speed = if speed.is_finite() {
            speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
        } else {
            1.0
        };
        self.shared.lock().playback_speed = speed;
    }

    /// Get current mode
    pub fn mode(&self) -> RecorderMode {
        self.shared.lock().mode
    }

    /// Check if recording
    pub fn is_recording(&self) -> bool {
        self.mode().is_recording()
    }

    /// Check if playing
    pub fn is_playing(&self) -> bool {
        self.mode().is_playing()
    }

    /// Get number of samples in the current or last log
    pub fn sample_count(&self) -> usize {
        self.shared.lock().log.len()
    }

    /// Offset of the last captured sample
    pub fn duration(&self) -> Duration {
        self.shared.lock().log.duration()
    }

    /// Snapshot of the current or last log
    pub fn log(&self) -> RecordLog<T> {
        self.shared.lock().log.clone()
    }

    /// Start a new recording.
    ///
    /// Discards the previous log. An active playback is cancelled first.
    pub fn start_recording(&self) {
        let mut inner = self.shared.lock();
        if inner.cancel_playback() {
            tracing::info!("Playback cancelled by new recording");
        }

        inner.log = RecordLog::new(self.shared.scheduler.now());
        inner.mode = RecorderMode::Recording;
        tracing::info!("Recording started");
    }

    /// Capture a copy of `state` if recording; otherwise do nothing
    pub fn record(&self, state: &T) {
        let mut inner = self.shared.lock();
        if !inner.mode.is_recording() {
            tracing::trace!("Ignoring state change while {}", inner.mode);
            return;
        }

        if inner.max_samples > 0 && inner.log.len() >= inner.max_samples {
            tracing::debug!("Sample limit {} reached, dropping state", inner.max_samples);
            return;
        }

        let now = self.shared.scheduler.now();
        inner.log.push(now, state.clone());
        tracing::trace!("Recorded sample {} at {:?}", inner.log.len(), inner.log.duration());
    }

    /// End the current recording and freeze its log. No-op unless recording.
    pub fn end_recording(&self) {
        let mut inner = self.shared.lock();
        if !inner.mode.is_recording() {
            tracing::debug!("end_recording ignored while {}", inner.mode);
            return;
        }

        inner.log.freeze();
        inner.mode = RecorderMode::Idle;
        tracing::info!(
            "Recording ended: {} samples over {:?}",
            inner.log.len(),
            inner.log.duration()
        );
    }
}
