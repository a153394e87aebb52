//! Level countdown.
//!
//! Steps down once per whole second of applied time. Time delivered while
//! paused is discarded, sub-second carry is kept so a pause cycle never
//! shifts the step boundary.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::scheduler::Scheduler;
use super::task::{TaskState, TimedTask};
use crate::error::ValidationError;
use crate::queue::lock;

const STEP: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct State {
    task: TaskState,
    remaining_secs: u64,
    carry: Duration,
}

#[derive(Debug)]
struct Inner {
    duration_secs: u64,
    state: Mutex<State>,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    inner: Arc<Inner>,
}

impl Countdown {
    pub fn new(duration_secs: u64) -> Result<Self, ValidationError> {
        if duration_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "level.duration_secs".into(),
                message: "level duration must be greater than zero".into(),
            });
        }
        Ok(Self {
            inner: Arc::new(Inner {
                duration_secs,
                state: Mutex::new(State {
                    task: TaskState::Idle,
                    remaining_secs: duration_secs,
                    carry: Duration::ZERO,
                }),
            }),
        })
    }

    /// Begin counting on `scheduler`. Only the first call has an effect.
    pub fn start(&self, scheduler: &Scheduler) {
        if lock(&self.inner.state).task.start() {
            scheduler.register(self.inner.clone());
        }
    }

    pub fn duration_secs(&self) -> u64 {
        self.inner.duration_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        lock(&self.inner.state).remaining_secs
    }

    /// The level is over once no time remains.
    pub fn timeout(&self) -> bool {
        self.remaining_secs() == 0
    }

    /// Restore the full level duration, keeping the running/paused state.
    pub fn reset_timer(&self) {
        let mut state = lock(&self.inner.state);
        state.remaining_secs = self.inner.duration_secs;
        state.carry = Duration::ZERO;
    }

    pub fn state(&self) -> TaskState {
        lock(&self.inner.state).task
    }

    pub fn as_task(&self) -> Arc<dyn TimedTask> {
        self.inner.clone()
    }
}

impl TimedTask for Inner {
    fn tick(&self, elapsed: Duration) {
        let mut state = lock(&self.state);
        if state.task != TaskState::Running {
            return;
        }
        state.carry = state.carry.saturating_add(elapsed);
        while state.carry >= STEP && state.remaining_secs > 0 {
            state.carry -= STEP;
            state.remaining_secs -= 1;
        }
        if state.remaining_secs == 0 {
            state.carry = Duration::ZERO;
        }
    }

    fn pause(&self) {
        lock(&self.state).task.pause();
    }

    fn unpause(&self) {
        lock(&self.state).task.unpause();
    }

    fn stop(&self) {
        lock(&self.state).task.stop();
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).task == TaskState::Paused
    }

    fn is_stopped(&self) -> bool {
        lock(&self.state).task == TaskState::Stopped
    }
}

delegate_timed_task!(Countdown);

#[cfg(test)]
mod tests {
    use super::*;

    fn running(secs: u64) -> (Countdown, Scheduler) {
        let scheduler = Scheduler::default();
        let countdown = Countdown::new(secs).unwrap();
        countdown.start(&scheduler);
        (countdown, scheduler)
    }

    #[test]
    fn rejects_zero_duration() {
        assert!(Countdown::new(0).is_err());
    }

    #[test]
    fn counts_whole_seconds() {
        let (countdown, scheduler) = running(5);
        for _ in 0..6 {
            scheduler.advance(Duration::from_millis(250));
        }
        assert_eq!(countdown.remaining_secs(), 4);
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(countdown.remaining_secs(), 0);
        assert!(countdown.timeout());
    }

    #[test]
    fn fractional_milliseconds_add_up_to_a_step() {
        let (countdown, scheduler) = running(5);
        for _ in 0..3 {
            scheduler.advance(Duration::from_micros(333_400));
        }
        assert_eq!(countdown.remaining_secs(), 4);
    }

    #[test]
    fn idle_countdown_does_not_move() {
        let countdown = Countdown::new(5).unwrap();
        countdown.tick(Duration::from_secs(3));
        assert_eq!(countdown.remaining_secs(), 5);
    }

    #[test]
    fn paused_time_is_not_applied() {
        let (countdown, scheduler) = running(10);
        scheduler.advance(Duration::from_millis(1_500));
        countdown.pause();
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(countdown.remaining_secs(), 9);
        countdown.unpause();
        // Carry of 500ms survives the pause.
        scheduler.advance(Duration::from_millis(500));
        assert_eq!(countdown.remaining_secs(), 8);
    }

    #[test]
    fn reset_restores_full_duration() {
        let (countdown, scheduler) = running(3);
        scheduler.advance(Duration::from_secs(3));
        assert!(countdown.timeout());
        countdown.reset_timer();
        assert_eq!(countdown.remaining_secs(), 3);
        assert!(!countdown.timeout());
        assert_eq!(countdown.state(), TaskState::Running);
    }

    #[test]
    fn stop_is_idempotent_and_terminal() {
        let (countdown, scheduler) = running(3);
        countdown.stop();
        countdown.stop();
        countdown.unpause();
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(countdown.remaining_secs(), 3);
        assert!(countdown.is_stopped());
        assert_eq!(scheduler.task_count(), 0);
    }
}
