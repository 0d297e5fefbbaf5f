//! Session recording and playback module
//!
//! This module records the live viewer state as it changes and replays the
//! captured sequence later with its original timing.
//!
//! # Features
//!
//! - Capture every state change pushed by the viewer, timestamped against
//!   the start of the recording
//! - Freeze the log when recording ends; a new recording discards it
//! - Replay the frozen log through a caller-supplied step callback without
//!   blocking the caller
//! - Cancel a running playback by starting a new recording, replaying, or
//!   stopping explicitly
//! - Play back at original or scaled speed
//!
//! # Modes
//!
//! The recorder is always in exactly one [`RecorderMode`]:
//!
//! ```text
//! Idle --start_recording--> Recording --end_recording--> Idle
//! Idle --play (log non-empty)--> Playing --last step / stop--> Idle
//! Playing --start_recording--> Recording
//! ```

pub mod player;
pub mod recorder;
pub mod types;

pub use recorder::{Recorder, MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED};
pub use types::{RecordLog, RecorderMode, Sample};
