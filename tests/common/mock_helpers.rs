//! Mock construction helpers

use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use mockall::mock;
use viewstate_recorder::scheduler::Task;
use viewstate_recorder::{ManualScheduler, RecorderError, Scheduler, TimerHandle};

mock! {
    pub Scheduler {}

    impl viewstate_recorder::Scheduler for Scheduler {
        fn now(&self) -> Instant;
        fn schedule(&self, delay: Duration, task: Task) -> viewstate_recorder::Result<TimerHandle>;
    }
}

/// Mock scheduler that tells time from `clock` and refuses every timer
pub fn create_failing_scheduler(clock: ManualScheduler) -> MockScheduler {
    let mut mock = MockScheduler::new();
    mock.expect_now().returning(move || clock.now());
    mock.expect_schedule().returning(|_, _| {
        Err(RecorderError::SchedulerUnavailable(
            "timer primitive offline".to_string(),
        ))
    });
    mock
}

/// Channel pair for forwarding playback steps to the test thread
pub fn create_step_channel<T>() -> (Sender<(T, bool)>, Receiver<(T, bool)>) {
    unbounded()
}
