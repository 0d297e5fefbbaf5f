//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One delivered playback step
#[derive(Debug, Clone, PartialEq)]
pub struct Step<T> {
    pub state: T,
    pub is_final: bool,
}

/// Shared list of delivered steps
pub type StepLog<T> = Arc<Mutex<Vec<Step<T>>>>;

/// Create a step log and a callback that appends to it
pub fn step_recorder<T: Send + 'static>() -> (StepLog<T>, impl FnMut(T, bool) + Send + 'static) {
    let log: StepLog<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let callback = move |state, is_final| {
        sink.lock().unwrap().push(Step { state, is_final });
    };
    (log, callback)
}

/// States of every delivered step, in delivery order
pub fn delivered_states<T: Clone>(log: &StepLog<T>) -> Vec<T> {
    log.lock().unwrap().iter().map(|s| s.state.clone()).collect()
}

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_millis(100)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
