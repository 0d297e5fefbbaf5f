//! Core data types for the viewer state
//!
//! The recorder itself never looks inside a snapshot; these types describe
//! what the 3D viewer reports on every state change and what it accepts
//! back when a recorded session is replayed.
//!
//! # Main Types
//!
//! - [`ViewMode`] - Which presentation the viewer is in (panorama, floorplan, ...)
//! - [`ViewerState`] - Full camera/mode snapshot at one instant
//! - [`StateUpdate`] - Partial update; unset fields keep their current value
//!
//! # Angles
//!
//! `longitude` and `latitude` are radians. `fov` is the vertical field of
//! view in degrees, matching what the viewer reports.

use serde::{Deserialize, Serialize};

/// Default vertical field of view in degrees
pub const DEFAULT_FOV: f64 = 90.0;

/// Presentation mode of the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ViewMode {
    /// Walking through panoramas from the inside
    #[default]
    Panorama,
    /// Tilted overview of the whole model
    Floorplan,
    /// Straight-down overview
    Topview,
    /// Free orbit around the model
    Model,
}

impl ViewMode {
    /// Display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            ViewMode::Panorama => "Panorama",
            ViewMode::Floorplan => "Floorplan",
            ViewMode::Topview => "Topview",
            ViewMode::Model => "Model",
        }
    }

    /// All modes, in menu order
    pub fn all() -> &'static [ViewMode] {
        &[
            ViewMode::Panorama,
            ViewMode::Floorplan,
            ViewMode::Topview,
            ViewMode::Model,
        ]
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Snapshot of the viewer's configuration at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    /// Active presentation mode
    pub mode: ViewMode,
    /// Index of the panorama the camera stands in
    pub pano_index: usize,
    /// Horizontal camera angle (radians)
    pub longitude: f64,
    /// Vertical camera angle (radians)
    pub latitude: f64,
    /// Vertical field of view (degrees)
    pub fov: f64,
    /// Camera position offset in model space
    pub offset: [f64; 3],
    /// Orbit distance, only meaningful outside panorama mode
    pub distance: f64,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            mode: ViewMode::Panorama,
            pano_index: 0,
            longitude: 0.0,
            latitude: 0.0,
            fov: DEFAULT_FOV,
            offset: [0.0; 3],
            distance: 0.0,
        }
    }
}

impl ViewerState {
    /// Create a state in the given mode with everything else defaulted
    pub fn new(mode: ViewMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Set longitude
    pub fn with_longitude(mut self, longitude: f64) -> Self {
        self.longitude = longitude;
        self
    }

    /// Set latitude
    pub fn with_latitude(mut self, latitude: f64) -> Self {
        self.latitude = latitude;
        self
    }

    /// Set panorama index
    pub fn with_pano_index(mut self, pano_index: usize) -> Self {
        self.pano_index = pano_index;
        self
    }

    /// Apply a partial update in place.
    ///
    /// Returns true if any field actually changed.
    pub fn apply(&mut self, update: &StateUpdate) -> bool {
        let before = self.clone();

        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(pano_index) = update.pano_index {
            self.pano_index = pano_index;
        }
        if let Some(longitude) = update.longitude {
            self.longitude = longitude;
        }
        if let Some(latitude) = update.latitude {
            self.latitude = latitude;
        }
        if let Some(fov) = update.fov {
            self.fov = fov;
        }
        if let Some(offset) = update.offset {
            self.offset = offset;
        }
        if let Some(distance) = update.distance {
            self.distance = distance;
        }

        *self != before
    }
}

/// Partial viewer state update
///
/// Every field is optional; `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub mode: Option<ViewMode>,
    pub pano_index: Option<usize>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub fov: Option<f64>,
    pub offset: Option<[f64; 3]>,
    pub distance: Option<f64>,
}

impl StateUpdate {
    /// Update that only switches mode
    pub fn mode(mode: ViewMode) -> Self {
        Self {
            mode: Some(mode),
            ..Default::default()
        }
    }

    /// Update that only sets longitude
    pub fn longitude(longitude: f64) -> Self {
        Self {
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    /// Check if the update would change nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<ViewerState> for StateUpdate {
    fn from(state: ViewerState) -> Self {
        Self {
            mode: Some(state.mode),
            pano_index: Some(state.pano_index),
            longitude: Some(state.longitude),
            latitude: Some(state.latitude),
            fov: Some(state.fov),
            offset: Some(state.offset),
            distance: Some(state.distance),
        }
    }
}
