//! Session data types

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mode of the recorder. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecorderMode {
    /// Neither recording nor playing
    #[default]
    Idle,
    /// Capturing state changes into the log
    Recording,
    /// Replaying the frozen log
    Playing,
}

impl RecorderMode {
    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderMode::Recording)
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        matches!(self, RecorderMode::Playing)
    }

    /// Check if idle
    pub fn is_idle(&self) -> bool {
        matches!(self, RecorderMode::Idle)
    }

    /// Display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            RecorderMode::Idle => "Idle",
            RecorderMode::Recording => "Recording",
            RecorderMode::Playing => "Playing",
        }
    }
}

impl std::fmt::Display for RecorderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A captured state paired with its offset from the start of recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample<T> {
    /// Time since the recording started
    pub elapsed: Duration,
    /// Owned copy of the state at that instant
    pub state: T,
}

/// Ordered, timestamped history of one recording session
///
/// Samples are kept in the order `push` was called, which is also
/// non-decreasing `elapsed` order. The sample buffer is reference counted so
/// a playback run can hold on to a frozen log without copying it.
#[derive(Debug, Clone)]
pub struct RecordLog<T> {
    /// Anchor that `elapsed` values are measured from
    started_at: Instant,
    /// Wall-clock time the recording started
    recorded_at: chrono::DateTime<chrono::Utc>,
    /// Captured samples
    samples: Arc<Vec<Sample<T>>>,
    /// Whether the log stopped accepting samples
    frozen: bool,
}

impl<T> RecordLog<T> {
    /// Create an empty, writable log anchored at `started_at`
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            recorded_at: chrono::Utc::now(),
            samples: Arc::new(Vec::new()),
            frozen: false,
        }
    }

    /// Create an empty log that is already frozen
    pub fn empty_frozen(started_at: Instant) -> Self {
        Self {
            frozen: true,
            ..Self::new(started_at)
        }
    }

    /// Stop accepting samples
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Check if the log is frozen
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// All samples in recorded order
    pub fn samples(&self) -> &[Sample<T>] {
        &self.samples
    }

    /// Shared handle to the sample buffer
    pub(crate) fn shared_samples(&self) -> Arc<Vec<Sample<T>>> {
        self.samples.clone()
    }

    /// Get the number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Offset of the last sample, zero for an empty log
    pub fn duration(&self) -> Duration {
        self.samples
            .last()
            .map(|s| s.elapsed)
            .unwrap_or(Duration::ZERO)
    }

    /// Anchor instant of the recording
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wall-clock start of the recording
    pub fn recorded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.recorded_at
    }
}

impl<T: Clone> RecordLog<T> {
    /// Append a sample taken at `now`.
    ///
    /// Returns false without storing anything if the log is frozen.
    pub fn push(&mut self, now: Instant, state: T) -> bool {
        if self.frozen {
            return false;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        // Never let a sample go backwards, even if the clock source does
        let elapsed = self
            .samples
            .last()
            .map_or(elapsed, |last| elapsed.max(last.elapsed));

        Arc::make_mut(&mut self.samples).push(Sample { elapsed, state });
        true
    }
}

/// Delay between sample `index - 1` and sample `index`; zero for the first
pub(crate) fn gap_before<T>(samples: &[Sample<T>], index: usize) -> Duration {
    match index {
        0 => Duration::ZERO,
        i => samples[i]
            .elapsed
            .saturating_sub(samples[i - 1].elapsed),
    }
}
