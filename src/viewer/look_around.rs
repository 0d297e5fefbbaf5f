//! Automatic look-around: keeps turning the camera at a fixed rate

use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::Result;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::types::StateUpdate;

use super::Viewer;

/// Default rotation per tick (half a degree)
pub const DEFAULT_STEP_RAD: f64 = PI / 360.0;

/// Default tick interval, roughly one frame at 60 Hz
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(16);

struct Active {
    generation: u64,
    timer: TimerHandle,
}

struct LookAroundShared {
    viewer: Viewer,
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
    step: f64,
    active: Mutex<Option<Active>>,
    next_generation: Mutex<u64>,
}

/// Rotates the viewer's longitude by `step` every `interval` while active
#[derive(Clone)]
pub struct LookAround {
    shared: Arc<LookAroundShared>,
}

impl LookAround {
    /// Create a look-around controller with the default rate
    pub fn new(viewer: Viewer, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_rate(viewer, scheduler, DEFAULT_INTERVAL, DEFAULT_STEP_RAD)
    }

    /// Create a look-around controller with an explicit rate
    pub fn with_rate(
        viewer: Viewer,
        scheduler: Arc<dyn Scheduler>,
        interval: Duration,
        step: f64,
    ) -> Self {
        Self {
            shared: Arc::new(LookAroundShared {
                viewer,
                scheduler,
                interval,
                step,
                active: Mutex::new(None),
                next_generation: Mutex::new(0),
            }),
        }
    }

    /// Check if rotating
    pub fn is_active(&self) -> bool {
        self.shared
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start rotating. Returns false if already active.
    pub fn start(&self) -> Result<bool> {
        let mut active = self
            .shared
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Ok(false);
        }

        let generation = {
            let mut next = self
                .shared
                .next_generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };

        let timer = schedule_tick(&self.shared, generation)?;
        *active = Some(Active { generation, timer });
        tracing::debug!("Look-around started");
        Ok(true)
    }

    /// Stop rotating. Returns false if not active.
    pub fn stop(&self) -> bool {
        let stopped = self
            .shared
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match stopped {
            Some(active) => {
                active.timer.cancel();
                tracing::debug!("Look-around stopped");
                true
            }
            None => false,
        }
    }
}

fn schedule_tick(shared: &Arc<LookAroundShared>, generation: u64) -> Result<TimerHandle> {
    let weak = Arc::downgrade(shared);
    shared.scheduler.schedule(
        shared.interval,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                tick(&shared, generation);
            }
        }),
    )
}

fn tick(shared: &Arc<LookAroundShared>, generation: u64) {
    let is_current = |shared: &LookAroundShared| {
        shared
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    };

    if !is_current(shared) {
        return;
    }

    let step = shared.step;
    shared
        .viewer
        .update_with(|state| StateUpdate::longitude(state.longitude + step));

    let mut active = shared.active.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(current) = active.as_mut().filter(|a| a.generation == generation) else {
        return;
    };
    match schedule_tick(shared, generation) {
        Ok(timer) => current.timer = timer,
        Err(e) => {
            tracing::warn!("Look-around stopped, could not schedule tick: {}", e);
            *active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn setup() -> (LookAround, Viewer, ManualScheduler) {
        let scheduler = ManualScheduler::new();
        let viewer = Viewer::default();
        let look_around = LookAround::new(viewer.clone(), Arc::new(scheduler.clone()));
        (look_around, viewer, scheduler)
    }

    #[test]
    fn test_rotates_every_interval() {
        let (look_around, viewer, scheduler) = setup();
        assert!(look_around.start().unwrap());
        assert!(!look_around.start().unwrap());

        scheduler.advance(DEFAULT_INTERVAL * 10);
        let expected = DEFAULT_STEP_RAD * 10.0;
        assert!((viewer.state().longitude - expected).abs() < 1e-9);
    }

    #[test]
    fn test_stop_halts_rotation() {
        let (look_around, viewer, scheduler) = setup();
        look_around.start().unwrap();
        scheduler.advance(DEFAULT_INTERVAL * 2);

        assert!(look_around.stop());
        assert!(!look_around.stop());
        assert!(!look_around.is_active());

        let longitude = viewer.state().longitude;
        scheduler.advance(DEFAULT_INTERVAL * 5);
        assert_eq!(viewer.state().longitude, longitude);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_restart_does_not_double_speed() {
        let (look_around, viewer, scheduler) = setup();
        look_around.start().unwrap();
        look_around.stop();
        look_around.start().unwrap();

        scheduler.advance(DEFAULT_INTERVAL * 4);
        let expected = DEFAULT_STEP_RAD * 4.0;
        assert!((viewer.state().longitude - expected).abs() < 1e-9);
    }

    #[test]
    fn test_start_fails_without_scheduler() {
        let (look_around, _, scheduler) = setup();
        scheduler.shutdown();
        assert!(look_around.start().is_err());
        assert!(!look_around.is_active());
    }
}
