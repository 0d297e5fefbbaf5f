//! Test data builders for recorded sessions

use std::sync::Arc;
use std::time::Duration;

use viewstate_recorder::{ManualScheduler, Recorder};

/// Builds a finished recording on a virtual clock
///
/// Each `at(ms, state)` records `state` that many milliseconds after the
/// recording started.
pub struct SessionBuilder<T> {
    samples: Vec<(u64, T)>,
}

impl<T: Clone + Send + Sync + 'static> SessionBuilder<T> {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn at(mut self, ms: u64, state: T) -> Self {
        self.samples.push((ms, state));
        self
    }

    /// Record all samples and end the recording
    pub fn build(self) -> (Recorder<T>, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let recorder = Recorder::new(Arc::new(scheduler.clone()));

        recorder.start_recording();
        let mut now = 0;
        for (ms, state) in self.samples {
            assert!(ms >= now, "samples must be added in time order");
            scheduler.advance(Duration::from_millis(ms - now));
            now = ms;
            recorder.record(&state);
        }
        recorder.end_recording();

        (recorder, scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_builder() {
        let (recorder, _) = SessionBuilder::new().at(0, 'a').at(40, 'b').build();

        assert_eq!(recorder.sample_count(), 2);
        assert_eq!(recorder.duration(), Duration::from_millis(40));
        assert!(!recorder.is_recording());
    }
}
