//! # viewstate-recorder: Session Recorder for 3D Viewers
//!
//! Captures the live state of a panorama/floorplan viewer as it changes and
//! replays the captured sequence later with its original timing, one step at
//! a time, without blocking the caller.
//!
//! ## Architecture
//!
//! - **Session**: [`Recorder`] owns the timestamped log and the playback chain
//! - **Scheduler**: cancellable one-shot timers ([`TokioScheduler`] on a tokio
//!   runtime, [`ManualScheduler`] for host frame loops and tests)
//! - **Viewer**: in-process stand-in for the viewer's state-change notification
//! - **Config**: JSON settings stored in the platform data directory
//!
//! The recorder never interprets snapshots. It stores owned copies and hands
//! them back; [`ViewerState`] is the snapshot the viewer produces, but any
//! `Clone + Send + Sync` value works.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use viewstate_recorder::{Recorder, TokioScheduler, Viewer, ViewerState};
//!
//! let scheduler = Arc::new(TokioScheduler::current()?);
//! let viewer = Viewer::new(ViewerState::default());
//! let recorder = Recorder::new(scheduler);
//! recorder.attach(&viewer);
//!
//! recorder.start_recording();
//! // ... the user looks around ...
//! recorder.end_recording();
//!
//! let target = viewer.clone();
//! let started = recorder.play(move |state, is_final| {
//!     target.replace_state(state);
//!     if is_final {
//!         tracing::info!("Replay done");
//!     }
//! })?;
//! ```

pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod types;
pub mod viewer;

// Re-export commonly used types
pub use config::{AppConfig, DemoSettings, RecorderSettings};
pub use error::{RecorderError, Result};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TokioScheduler};
pub use session::{RecordLog, Recorder, RecorderMode, Sample};
pub use types::{StateUpdate, ViewMode, ViewerState};
pub use viewer::{LookAround, SubscriptionId, Viewer};
