//! Shared behaviour of every timer-driven entity.
//!
//! A [`TimedTask`] owns its state behind interior mutability so the scheduler
//! can tick it from its own task while the frame loop reads it concurrently.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!   \        |          /
//!    +---> Stopped <---+
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A timer driven by the [`Scheduler`](super::Scheduler).
///
/// `tick` receives the simulated time elapsed since the previous tick. Pausing
/// only gates whether that time is applied; `stop` is terminal and idempotent.
pub trait TimedTask: Send + Sync {
    fn tick(&self, elapsed: Duration);
    fn pause(&self);
    fn unpause(&self);
    fn stop(&self);
    fn is_paused(&self) -> bool;
    fn is_stopped(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl TaskState {
    /// Idle -> Running. Returns whether the transition happened.
    pub fn start(&mut self) -> bool {
        self.transition(TaskState::Idle, TaskState::Running)
    }

    pub fn pause(&mut self) -> bool {
        self.transition(TaskState::Running, TaskState::Paused)
    }

    pub fn unpause(&mut self) -> bool {
        self.transition(TaskState::Paused, TaskState::Running)
    }

    /// Any state -> Stopped. Returns `false` if already stopped.
    pub fn stop(&mut self) -> bool {
        if *self == TaskState::Stopped {
            return false;
        }
        *self = TaskState::Stopped;
        true
    }

    fn transition(&mut self, from: TaskState, to: TaskState) -> bool {
        if *self != from {
            return false;
        }
        *self = to;
        true
    }
}

/// Remaining time that decays towards zero, in milliseconds.
///
/// Sub-millisecond remainders of each delta are carried into the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decay {
    total_ms: u64,
    remaining_ms: u64,
    #[serde(default)]
    carry_ns: u32,
}

impl Decay {
    pub fn new(field: &str, total: Duration) -> Result<Self, ValidationError> {
        let total_ms = u64::try_from(total.as_millis()).unwrap_or(u64::MAX);
        if total_ms == 0 {
            return Err(ValidationError::InvalidValue {
                field: field.into(),
                message: "duration must be greater than zero".into(),
            });
        }
        Ok(Self {
            total_ms,
            remaining_ms: total_ms,
            carry_ns: 0,
        })
    }

    /// Infallible variant; a zero total is raised to one millisecond.
    pub fn from_ms(total_ms: u64) -> Self {
        let total_ms = total_ms.max(1);
        Self {
            total_ms,
            remaining_ms: total_ms,
            carry_ns: 0,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Subtract `elapsed`, clamping at zero.
    pub fn consume(&mut self, elapsed: Duration) {
        let nanos = elapsed.as_nanos() + u128::from(self.carry_ns);
        let elapsed_ms = u64::try_from(nanos / 1_000_000).unwrap_or(u64::MAX);
        self.carry_ns = (nanos % 1_000_000) as u32;
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_ms == 0
    }

    /// 0.0 ..= 100.0
    pub fn remaining_pct(&self) -> f64 {
        self.remaining_ms as f64 / self.total_ms as f64 * 100.0
    }
}
