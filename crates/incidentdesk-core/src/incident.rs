//! Incidents: timed units of work that decay towards expiry.
//!
//! An incident sits idle in an asset's queue until promoted, then loses
//! remaining time on every scheduler tick unless paused. Workstation
//! incidents publish an urgency cue the first time they fall to 25% and then
//! 10% of their allotted time; dispatch-desk calls never do.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |
//!            +-> (remaining == 0: expired) -> Stopped
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::error::ValidationError;
use crate::events::{Event, EventSink, IncidentId, Urgency};
use crate::expertise::Expertise;
use crate::queue::lock;
use crate::timer::{Decay, Scheduler, TaskState, TimedTask};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
struct State {
    task: TaskState,
    decay: Decay,
    quarter_notified: bool,
    tenth_notified: bool,
}

#[derive(Debug)]
struct Inner {
    id: IncidentId,
    expertise: Expertise,
    events: EventSink,
    state: Mutex<State>,
}

/// Shared handle to one incident. Clones refer to the same incident.
#[derive(Debug, Clone)]
pub struct Incident {
    inner: Arc<Inner>,
}

impl Incident {
    /// Create an incident whose urgency cues go nowhere.
    pub fn new(expertise: Expertise, time_to_solve: Duration) -> Result<Self, ValidationError> {
        Self::with_events(expertise, time_to_solve, EventSink::disabled())
    }

    /// Create an incident publishing urgency cues to `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if `time_to_solve` is zero.
    pub fn with_events(
        expertise: Expertise,
        time_to_solve: Duration,
        events: EventSink,
    ) -> Result<Self, ValidationError> {
        let decay = Decay::new("time_to_solve", time_to_solve)?;
        Ok(Self {
            inner: Arc::new(Inner {
                id: IncidentId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
                expertise,
                events,
                state: Mutex::new(State {
                    task: TaskState::Idle,
                    decay,
                    quarter_notified: false,
                    tenth_notified: false,
                }),
            }),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> IncidentId {
        self.inner.id
    }

    pub fn expertise(&self) -> Expertise {
        self.inner.expertise
    }

    pub fn time_to_solve_ms(&self) -> u64 {
        lock(&self.inner.state).decay.total_ms()
    }

    pub fn remaining_ms(&self) -> u64 {
        lock(&self.inner.state).decay.remaining_ms()
    }

    /// Remaining time as a percentage of the allotted time (0.0 ..= 100.0).
    pub fn remaining_pct(&self) -> f64 {
        lock(&self.inner.state).decay.remaining_pct()
    }

    pub fn has_expired(&self) -> bool {
        lock(&self.inner.state).decay.is_exhausted()
    }

    pub fn state(&self) -> TaskState {
        lock(&self.inner.state).task
    }

    /// Whether the cue for `urgency` has already fired.
    pub fn notified(&self, urgency: Urgency) -> bool {
        let state = lock(&self.inner.state);
        match urgency {
            Urgency::Quarter => state.quarter_notified,
            Urgency::Tenth => state.tenth_notified,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start decaying on `scheduler`. Only an idle incident can start.
    pub fn start(&self, scheduler: &Scheduler) {
        if lock(&self.inner.state).task.start() {
            debug!(
                incident = %self.inner.id,
                expertise = %self.inner.expertise,
                "incident started"
            );
            scheduler.register(self.inner.clone());
        }
    }

    pub fn as_task(&self) -> Arc<dyn TimedTask> {
        self.inner.clone()
    }
}

impl PartialEq for Incident {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Incident {}

impl Inner {
    fn urgency_crossed(&self, state: &mut State) -> Option<Urgency> {
        if self.expertise.is_dispatch() || state.decay.is_exhausted() {
            return None;
        }
        let remaining = state.decay.remaining_ms();
        let total = state.decay.total_ms();
        if !state.quarter_notified && remaining.saturating_mul(4) <= total {
            state.quarter_notified = true;
            Some(Urgency::Quarter)
        } else if !state.tenth_notified && remaining.saturating_mul(10) <= total {
            state.tenth_notified = true;
            Some(Urgency::Tenth)
        } else {
            None
        }
    }
}

impl TimedTask for Inner {
    fn tick(&self, elapsed: Duration) {
        let (urgency, remaining_ms) = {
            let mut state = lock(&self.state);
            if state.task != TaskState::Running {
                return;
            }
            state.decay.consume(elapsed);
            (self.urgency_crossed(&mut state), state.decay.remaining_ms())
        };

        if let Some(urgency) = urgency {
            debug!(incident = %self.id, pct = urgency.percent(), remaining_ms, "incident urgency");
            self.events.emit(Event::IncidentUrgent {
                incident_id: self.id,
                expertise: self.expertise,
                urgency,
                remaining_ms,
                at: Utc::now(),
            });
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

delegate_timed_task!(Incident);

#[cfg(test)]
mod tests {
    use super::*;

    fn running(expertise: Expertise, secs: u64) -> (Incident, Scheduler, EventSink) {
        let events = EventSink::new();
        let scheduler = Scheduler::default();
        let incident =
            Incident::with_events(expertise, Duration::from_secs(secs), events.clone()).unwrap();
        incident.start(&scheduler);
        (incident, scheduler, events)
    }

    fn advance_secs(scheduler: &Scheduler, secs: u64) {
        for _ in 0..secs * 4 {
            scheduler.advance(Duration::from_millis(250));
        }
    }

    fn urgencies(events: &EventSink) -> Vec<Urgency> {
        events
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                Event::IncidentUrgent { urgency, .. } => Some(urgency),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rejects_zero_time_to_solve() {
        let err = Incident::new(Expertise::Networking, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn idle_incident_does_not_decay() {
        let incident = Incident::new(Expertise::Database, Duration::from_secs(10)).unwrap();
        incident.tick(Duration::from_secs(5));
        assert_eq!(incident.remaining_pct(), 100.0);
        assert_eq!(incident.state(), TaskState::Idle);
    }

    #[test]
    fn quarter_cue_after_75_seconds() {
        let (incident, scheduler, events) = running(Expertise::Networking, 100);
        advance_secs(&scheduler, 75);

        assert!((incident.remaining_pct() - 25.0).abs() < 0.01);
        assert!(incident.notified(Urgency::Quarter));
        assert!(!incident.notified(Urgency::Tenth));
        assert_eq!(urgencies(&events), vec![Urgency::Quarter]);
    }

    #[test]
    fn cues_fire_once_and_in_order() {
        let (incident, scheduler, events) = running(Expertise::Security, 100);
        advance_secs(&scheduler, 99);
        assert_eq!(urgencies(&events), vec![Urgency::Quarter, Urgency::Tenth]);

        advance_secs(&scheduler, 5);
        assert!(incident.has_expired());
        assert!(urgencies(&events).is_empty());
    }

    #[test]
    fn large_jump_defers_tenth_cue_to_next_tick() {
        let (_incident, scheduler, events) = running(Expertise::Servers, 100);
        scheduler.advance(Duration::from_secs(95));
        assert_eq!(urgencies(&events), vec![Urgency::Quarter]);
        scheduler.advance(Duration::from_millis(250));
        assert_eq!(urgencies(&events), vec![Urgency::Tenth]);
    }

    #[test]
    fn dispatch_calls_never_cue() {
        let (incident, scheduler, events) = running(Expertise::Helpdesk, 20);
        advance_secs(&scheduler, 19);
        assert!(urgencies(&events).is_empty());
        assert!(!incident.notified(Urgency::Quarter));
        assert!(!incident.notified(Urgency::Tenth));
    }

    #[test]
    fn paused_incident_holds_remaining_time() {
        let (incident, scheduler, _events) = running(Expertise::Database, 10);
        advance_secs(&scheduler, 2);
        incident.pause();
        let held = incident.remaining_ms();
        advance_secs(&scheduler, 5);
        assert_eq!(incident.remaining_ms(), held);

        incident.unpause();
        advance_secs(&scheduler, 1);
        assert!(incident.remaining_ms() < held);
    }

    #[test]
    fn expiry_is_sticky_and_stop_is_idempotent() {
        let (incident, scheduler, _events) = running(Expertise::Workstations, 1);
        advance_secs(&scheduler, 2);
        assert!(incident.has_expired());
        assert_eq!(incident.remaining_pct(), 0.0);

        incident.stop();
        incident.stop();
        incident.pause();
        incident.unpause();
        assert!(incident.is_stopped());
        assert!(!incident.is_paused());
        assert_eq!(scheduler.task_count(), 1);
        scheduler.advance(Duration::ZERO);
        assert_eq!(scheduler.task_count(), 0);
    }

    #[test]
    fn clones_share_identity() {
        let a = Incident::new(Expertise::Networking, Duration::from_secs(5)).unwrap();
        let b = a.clone();
        let c = Incident::new(Expertise::Networking, Duration::from_secs(5)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
