//! Variable-rate incident generator.
//!
//! The spawner steps once per second of applied time. The first call of a
//! level arrives after a short fixed warm-up; every later one is scheduled
//! `multiplier * uniform(min_between, max_between)` seconds after the
//! previous. With accelerating pacing the multiplier follows the fraction of
//! level time left, from 1.0 at level start down to 0.5 at level end.
//!
//! Pausing gates production only: the clock, the multiplier and the schedule
//! keep advancing, so a ready tick reached while paused is skipped rather
//! than replayed later.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand_pcg::Pcg64;
use tracing::{debug, info, warn};

use crate::error::ValidationError;
use crate::events::{Event, EventSink};
use crate::expertise::Expertise;
use crate::incident::Incident;
use crate::queue::{lock, SharedQueue};
use crate::storage::{PacingMode, SpawnerConfig};
use crate::timer::{Scheduler, TaskState, TimedTask};

const STEP: Duration = Duration::from_secs(1);

/// Pacing multiplier for `remaining_secs` out of `total_secs` of level time.
///
/// `0.5 + (remaining / total) / 2`, clamped to `[0.5, 1.0]`.
pub fn pacing_multiplier(remaining_secs: u64, total_secs: u64) -> f64 {
    if total_secs == 0 {
        return 0.5;
    }
    let fraction = remaining_secs as f64 / total_secs as f64;
    (0.5 + fraction / 2.0).clamp(0.5, 1.0)
}

#[derive(Debug)]
struct State {
    task: TaskState,
    creating: bool,
    ticks: u64,
    next_tick: u64,
    remaining_secs: u64,
    multiplier: f64,
    carry: Duration,
}

struct Inner {
    config: SpawnerConfig,
    level_secs: u64,
    queue: SharedQueue<Incident>,
    events: EventSink,
    rng: Mutex<Pcg64>,
    state: Mutex<State>,
}

/// The single incident producer of a game context.
#[derive(Clone)]
pub struct IncidentSpawner {
    inner: Arc<Inner>,
}

impl IncidentSpawner {
    /// # Errors
    ///
    /// Returns an error if `config` holds a zero, inverted or oversized
    /// range, or if `level_secs` is zero.
    pub fn new(
        config: SpawnerConfig,
        level_secs: u64,
        rng: Pcg64,
        events: EventSink,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        if level_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "level.duration_secs".into(),
                message: "level duration must be greater than zero".into(),
            });
        }
        let state = State {
            task: TaskState::Idle,
            creating: true,
            ticks: 0,
            next_tick: config.first_incident_delay_secs,
            remaining_secs: level_secs,
            multiplier: 1.0,
            carry: Duration::ZERO,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                level_secs,
                queue: SharedQueue::new(),
                events,
                rng: Mutex::new(rng),
                state: Mutex::new(state),
            }),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn multiplier(&self) -> f64 {
        lock(&self.inner.state).multiplier
    }

    pub fn ticks(&self) -> u64 {
        lock(&self.inner.state).ticks
    }

    pub fn next_tick(&self) -> u64 {
        lock(&self.inner.state).next_tick
    }

    pub fn remaining_level_secs(&self) -> u64 {
        lock(&self.inner.state).remaining_secs
    }

    pub fn is_creating(&self) -> bool {
        lock(&self.inner.state).creating
    }

    pub fn state(&self) -> TaskState {
        lock(&self.inner.state).task
    }

    /// Incidents produced but not yet collected.
    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&self, scheduler: &Scheduler) {
        if lock(&self.inner.state).task.start() {
            info!(
                level_secs = self.inner.level_secs,
                pacing = ?self.inner.config.pacing,
                "spawner started"
            );
            scheduler.register(self.inner.clone());
        }
    }

    /// Take every incident produced so far. Empty once stopped.
    pub fn get(&self) -> Vec<Incident> {
        self.inner.queue.drain()
    }

    /// Queue an incident produced elsewhere (dispatch-desk redistribution).
    pub fn put(&self, incident: Incident) {
        if !self.inner.queue.push(incident) {
            warn!("spawner stopped, incident dropped");
        }
    }

    /// Return to level-start pacing: tick zero, full level time, multiplier
    /// 1.0 and the warm-up delay before the next call.
    pub fn reset(&self) {
        let mut state = lock(&self.inner.state);
        state.ticks = 0;
        state.carry = Duration::ZERO;
        state.remaining_secs = self.inner.level_secs;
        state.multiplier = 1.0;
        state.next_tick = self.inner.config.first_incident_delay_secs;
        info!("spawner reset");
    }

    pub fn as_task(&self) -> Arc<dyn TimedTask> {
        self.inner.clone()
    }
}

impl Inner {
    /// One second of level time.
    fn step(&self, state: &mut State) {
        state.ticks += 1;
        state.remaining_secs = state.remaining_secs.saturating_sub(1);
        state.multiplier = match self.config.pacing {
            PacingMode::Accelerating => pacing_multiplier(state.remaining_secs, self.level_secs),
            PacingMode::Fixed => 1.0,
        };

        if state.ticks < state.next_tick {
            return;
        }

        let mut rng = lock(&self.rng);
        if state.creating {
            self.create_and_send_next_incident(&mut rng);
        }
        let window = rng.gen_range(self.config.min_between_secs..=self.config.max_between_secs);
        let delay = ((window as f64 * state.multiplier).round() as u64).max(1);
        state.next_tick = state.ticks.saturating_add(delay);
        debug!(
            tick = state.ticks,
            next_tick = state.next_tick,
            multiplier = state.multiplier,
            "next incident scheduled"
        );
    }

    fn create_and_send_next_incident(&self, rng: &mut Pcg64) {
        let secs = rng.gen_range(self.config.min_solve_secs..=self.config.max_solve_secs);
        let incident = match Incident::with_events(
            Expertise::Helpdesk,
            Duration::from_secs(secs),
            self.events.clone(),
        ) {
            Ok(incident) => incident,
            Err(e) => {
                warn!(error = %e, "incident not created");
                return;
            }
        };
        self.events.emit(Event::IncidentSpawned {
            incident_id: incident.id(),
            expertise: incident.expertise(),
            time_to_solve_ms: incident.time_to_solve_ms(),
            at: Utc::now(),
        });
        debug!(incident = %incident.id(), secs, "incident spawned");
        self.queue.push(incident);
    }
}

impl TimedTask for Inner {
    fn tick(&self, elapsed: Duration) {
        let mut state = lock(&self.state);
        if state.task != TaskState::Running {
            return;
        }
        state.carry = state.carry.saturating_add(elapsed);
        while state.carry >= STEP {
            state.carry -= STEP;
            self.step(&mut state);
        }
    }

    fn pause(&self) {
        let mut state = lock(&self.state);
        if state.task != TaskState::Stopped {
            state.creating = false;
        }
    }

    fn unpause(&self) {
        let mut state = lock(&self.state);
        if state.task != TaskState::Stopped {
            state.creating = true;
        }
    }

    /// Permanently disables production and collection.
    fn stop(&self) {
        if lock(&self.state).task.stop() {
            self.queue.close();
            info!("spawner stopped");
        }
    }

    fn is_paused(&self) -> bool {
        !lock(&self.state).creating
    }

    fn is_stopped(&self) -> bool {
        lock(&self.state).task == TaskState::Stopped
    }
}

delegate_timed_task!(IncidentSpawner);

impl std::fmt::Debug for IncidentSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("IncidentSpawner")
            .field("state", &state.task)
            .field("creating", &state.creating)
            .field("ticks", &state.ticks)
            .field("next_tick", &state.next_tick)
            .field("multiplier", &state.multiplier)
            .finish()
    }
}
