//! In-process stand-in for the 3D viewer
//!
//! The real viewer renders panoramas and reports its camera state through a
//! "state changed" notification. This module keeps only that contract: a
//! current [`ViewerState`], partial updates, and handlers called after every
//! change. The recorder subscribes to it during recording and writes replayed
//! states back into it during playback.

pub mod look_around;

pub use look_around::LookAround;

use std::sync::{Arc, Mutex, PoisonError};

use crate::session::Recorder;
use crate::types::{StateUpdate, ViewMode, ViewerState};

/// Identifies a registered state-change handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&ViewerState) + Send + Sync>;

struct ViewerInner {
    state: ViewerState,
    handlers: Vec<(SubscriptionId, Handler)>,
    next_id: u64,
}

/// Shared handle to the viewer state
///
/// Handlers run synchronously on the thread that changed the state, in
/// registration order, with no viewer lock held.
#[derive(Clone)]
pub struct Viewer {
    inner: Arc<Mutex<ViewerInner>>,
}

impl Default for Viewer {
    fn default() -> Self {
        Self::new(ViewerState::default())
    }
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("Viewer")
            .field("state", &inner.state)
            .field("handlers", &inner.handlers.len())
            .finish()
    }
}

impl Viewer {
    /// Create a viewer showing `state`
    pub fn new(state: ViewerState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ViewerInner {
                state,
                handlers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ViewerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    pub fn state(&self) -> ViewerState {
        self.lock().state.clone()
    }

    /// Register a handler called with the new state after every change
    pub fn on_state_change<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ViewerState) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.handlers.push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.handlers.len();
        inner.handlers.retain(|(handler_id, _)| *handler_id != id);
        inner.handlers.len() != before
    }

    /// Apply a partial update; notifies only if something changed
    pub fn set_state(&self, update: StateUpdate) -> bool {
        self.update_with(|_| update)
    }

    /// Compute a partial update from the current state and apply it
    pub fn update_with<F>(&self, f: F) -> bool
    where
        F: FnOnce(&ViewerState) -> StateUpdate,
    {
        let (state, handlers) = {
            let mut inner = self.lock();
            let update = f(&inner.state);
            if !inner.state.apply(&update) {
                return false;
            }
            (inner.state.clone(), Self::handlers(&inner))
        };

        Self::notify(&state, &handlers);
        true
    }

    /// Replace the whole state, e.g. with a replayed snapshot
    pub fn replace_state(&self, state: ViewerState) -> bool {
        self.set_state(StateUpdate::from(state))
    }

    /// Switch presentation mode
    pub fn set_mode(&self, mode: ViewMode) -> bool {
        tracing::debug!("Switching viewer to {}", mode);
        self.set_state(StateUpdate::mode(mode))
    }

    fn handlers(inner: &ViewerInner) -> Vec<Handler> {
        inner
            .handlers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect()
    }

    fn notify(state: &ViewerState, handlers: &[Handler]) {
        for handler in handlers {
            handler(state);
        }
    }
}

impl Recorder<ViewerState> {
    /// Record every state change of `viewer`
    pub fn attach(&self, viewer: &Viewer) -> SubscriptionId {
        let recorder = self.clone();
        viewer.on_state_change(move |state| recorder.record(state))
    }
}
