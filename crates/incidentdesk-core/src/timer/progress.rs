//! Resolution progress for a character working an incident.
//!
//! The bar only tracks invested time. Detecting completion and resolving the
//! incident belongs to the character and asset layer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::scheduler::Scheduler;
use super::task::{Decay, TaskState, TimedTask};
use crate::display;
use crate::error::ValidationError;
use crate::expertise::Expertise;
use crate::incident::Incident;
use crate::queue::lock;

/// Specialists work an incident in a tenth of its allotted time.
const SPECIALIST_DIVISOR: u64 = 10;
/// Everyone else needs a fifth of it.
const GENERALIST_DIVISOR: u64 = 5;

/// Work time a character of expertise `worker` needs for an incident of
/// `incident` expertise allotted `time_to_solve_ms`. Never below 1ms.
pub fn required_work_ms(time_to_solve_ms: u64, worker: Expertise, incident: Expertise) -> u64 {
    let divisor = if worker.matches(incident) {
        SPECIALIST_DIVISOR
    } else {
        GENERALIST_DIVISOR
    };
    (time_to_solve_ms / divisor).max(1)
}

#[derive(Debug)]
struct State {
    task: TaskState,
    decay: Decay,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
}

#[derive(Debug, Clone)]
pub struct ProgressBar {
    inner: Arc<Inner>,
}

impl ProgressBar {
    /// A bar requiring `required` of work.
    ///
    /// # Errors
    ///
    /// Returns an error if `required` is zero.
    pub fn new(required: Duration) -> Result<Self, ValidationError> {
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    task: TaskState::Idle,
                    decay: Decay::new("required_work", required)?,
                }),
            }),
        })
    }

    /// A bar sized for `worker` resolving `incident`.
    pub fn for_incident(incident: &Incident, worker: Expertise) -> Self {
        let required_ms =
            required_work_ms(incident.time_to_solve_ms(), worker, incident.expertise());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    task: TaskState::Idle,
                    decay: Decay::from_ms(required_ms),
                }),
            }),
        }
    }

    pub fn start(&self, scheduler: &Scheduler) {
        if lock(&self.inner.state).task.start() {
            scheduler.register(self.inner.clone());
        }
    }

    pub fn required_ms(&self) -> u64 {
        lock(&self.inner.state).decay.total_ms()
    }

    pub fn remaining_ms(&self) -> u64 {
        lock(&self.inner.state).decay.remaining_ms()
    }

    pub fn remaining_pct(&self) -> f64 {
        lock(&self.inner.state).decay.remaining_pct()
    }

    /// True once all required work has been invested.
    pub fn is_solved(&self) -> bool {
        lock(&self.inner.state).decay.is_exhausted()
    }

    /// Image index for a bar rendered with `frames` images.
    pub fn frame(&self, frames: usize) -> usize {
        display::timer_frame(self.remaining_pct(), frames)
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
        if state.task == TaskState::Running {
            state.decay.consume(elapsed);
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

delegate_timed_task!(ProgressBar);
