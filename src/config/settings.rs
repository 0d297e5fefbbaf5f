//! Tunable settings for the recorder and the headless demo
//!
//! # Main Types
//!
//! - [`RecorderSettings`] - Sample limit and playback speed
//! - [`DemoSettings`] - How the bundled demo drives the simulated viewer

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::session::{MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};
use crate::viewer::look_around::DEFAULT_STEP_RAD;

/// Recorder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Maximum number of samples per recording (0 = unlimited)
    pub max_samples: usize,

    /// Playback speed multiplier (1.0 = original timing)
    pub playback_speed: f64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            max_samples: 0,
            playback_speed: 1.0,
        }
    }
}

impl RecorderSettings {
    /// Check the settings for values the recorder would silently change
    pub fn validate(&self) -> Result<(), String> {
        if !self.playback_speed.is_finite()
            || !(MIN_PLAYBACK_SPEED..=MAX_PLAYBACK_SPEED).contains(&self.playback_speed)
        {
            return Err(format!(
                "playback_speed must be between {} and {}, got {}",
                MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED, self.playback_speed
            ));
        }
        Ok(())
    }
}

/// Settings for the headless demo binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// How long to record, in milliseconds
    pub record_ms: u64,

    /// Look-around tick interval in milliseconds
    pub look_around_interval_ms: u64,

    /// Look-around rotation per tick in radians
    pub look_around_step_rad: f64,

    /// Switch the viewer to floorplan this long into the recording (0 = never)
    pub switch_mode_after_ms: u64,

    /// Print the recorded samples as JSON once playback finishes
    pub print_log: bool,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            record_ms: 2000,
            look_around_interval_ms: 16,
            look_around_step_rad: DEFAULT_STEP_RAD,
            switch_mode_after_ms: 1000,
            print_log: false,
        }
    }
}

impl DemoSettings {
    /// Recording length
    pub fn record_duration(&self) -> Duration {
        Duration::from_millis(self.record_ms)
    }

    /// Look-around tick interval
    pub fn look_around_interval(&self) -> Duration {
        Duration::from_millis(self.look_around_interval_ms)
    }

    /// Delay before switching mode, if enabled
    pub fn switch_mode_after(&self) -> Option<Duration> {
        (self.switch_mode_after_ms > 0).then(|| Duration::from_millis(self.switch_mode_after_ms))
    }

    /// Check the settings for values the demo cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.look_around_interval_ms == 0 {
            return Err("look_around_interval_ms must be greater than 0".to_string());
        }
        if self.record_ms == 0 {
            return Err("record_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}
