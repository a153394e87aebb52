//! Incident holders: workstations and the dispatch desk.
//!
//! Every asset buffers incoming incidents in arrival order and works at most
//! one at a time. `update` runs once per frame from the polling side: it
//! promotes the oldest pending incident when the asset is idle, and retires
//! the active one once it has expired.
//!
//! The dispatch desk answers calls. Solving a call hands a freshly drawn
//! workstation incident back to the spawner for routing.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rand_pcg::Pcg64;
use tracing::{debug, warn};

use crate::display;
use crate::events::{Event, EventSink};
use crate::expertise::Expertise;
use crate::incident::Incident;
use crate::spawner::IncidentSpawner;
use crate::storage::RedistributionConfig;
use crate::timer::{Scheduler, TimedTask};

/// Tile coordinates of an asset or character.
pub type Position = (u32, u32);

/// Reactions to an asset's incident lifecycle.
///
/// Callbacks run synchronously on the polling thread from within
/// [`Asset::update`] and [`Asset::solve_incident`].
pub trait IncidentObserver: Send {
    fn on_incoming(&mut self, _asset: &str) {}

    fn on_expiring(&mut self, _asset: &str) {}

    /// `remaining_pct` is the floored percentage of allotted time left.
    fn on_solving(&mut self, _asset: &str, _remaining_pct: u32) {}
}

/// State owned by the dispatch desk for turning calls into incidents.
pub struct DispatchDesk {
    spawner: IncidentSpawner,
    redistribution: RedistributionConfig,
    rng: Pcg64,
}

impl DispatchDesk {
    pub fn new(spawner: IncidentSpawner, redistribution: RedistributionConfig, rng: Pcg64) -> Self {
        Self {
            spawner,
            redistribution,
            rng,
        }
    }

    fn redistribute(&mut self, call: &Incident, events: &EventSink) {
        let expertise = Expertise::random_redistributable(&mut self.rng);
        let secs = self
            .rng
            .gen_range(self.redistribution.min_solve_secs..=self.redistribution.max_solve_secs);
        match Incident::with_events(expertise, Duration::from_secs(secs), events.clone()) {
            Ok(incident) => {
                events.emit(Event::IncidentRedistributed {
                    from: call.id(),
                    incident_id: incident.id(),
                    expertise,
                    time_to_solve_ms: incident.time_to_solve_ms(),
                    at: Utc::now(),
                });
                debug!(
                    call = %call.id(),
                    incident = %incident.id(),
                    %expertise,
                    secs,
                    "call redistributed"
                );
                self.spawner.put(incident);
            }
            Err(e) => warn!(error = %e, "redistributed incident not created"),
        }
    }
}

pub enum AssetKind {
    Workstation,
    DispatchDesk(Box<DispatchDesk>),
}

pub struct Asset {
    name: String,
    position: Position,
    kind: AssetKind,
    pending: VecDeque<Incident>,
    active: Option<Incident>,
    observers: Vec<Box<dyn IncidentObserver>>,
    scheduler: Scheduler,
    events: EventSink,
}

impl Asset {
    pub fn workstation(
        name: impl Into<String>,
        position: Position,
        scheduler: Scheduler,
        events: EventSink,
    ) -> Self {
        Self::with_kind(name.into(), position, AssetKind::Workstation, scheduler, events)
    }

    pub fn dispatch_desk(
        name: impl Into<String>,
        position: Position,
        desk: DispatchDesk,
        scheduler: Scheduler,
        events: EventSink,
    ) -> Self {
        Self::with_kind(
            name.into(),
            position,
            AssetKind::DispatchDesk(Box::new(desk)),
            scheduler,
            events,
        )
    }

    fn with_kind(
        name: String,
        position: Position,
        kind: AssetKind,
        scheduler: Scheduler,
        events: EventSink,
    ) -> Self {
        Self {
            name,
            position,
            kind,
            pending: VecDeque::new(),
            active: None,
            observers: Vec::new(),
            scheduler,
            events,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_dispatch_desk(&self) -> bool {
        matches!(self.kind, AssetKind::DispatchDesk(_))
    }

    pub fn active_incident(&self) -> Option<&Incident> {
        self.active.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Timer image index for the active incident.
    pub fn timer_frame(&self, frames: usize) -> Option<usize> {
        self.active
            .as_ref()
            .map(|incident| display::timer_frame(incident.remaining_pct(), frames))
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn register_observer(&mut self, observer: Box<dyn IncidentObserver>) {
        self.observers.push(observer);
    }

    /// Queue `incident` behind any already pending.
    pub fn add_incident(&mut self, incident: Incident) {
        self.events.emit(Event::IncidentRouted {
            incident_id: incident.id(),
            expertise: incident.expertise(),
            asset: self.name.clone(),
            at: Utc::now(),
        });
        self.pending.push_back(incident);
    }

    /// Promote or retire the active incident. Returns the number of
    /// incidents that expired (0 or 1).
    pub fn update(&mut self) -> u32 {
        let Some(active) = self.active.clone() else {
            if let Some(next) = self.pending.pop_front() {
                self.promote(next);
            }
            return 0;
        };
        if !active.has_expired() {
            return 0;
        }
        self.active = None;
        self.retire_expired(active);
        1
    }

    /// Resolve the active incident. Returns the reward percentage, or `None`
    /// when the asset had nothing to solve.
    pub fn solve_incident(&mut self) -> Option<u32> {
        let incident = self.active.take()?;
        let remaining_pct = incident.remaining_pct().floor() as u32;
        for observer in &mut self.observers {
            observer.on_solving(&self.name, remaining_pct);
        }
        incident.stop();
        self.events.emit(Event::IncidentSolved {
            incident_id: incident.id(),
            asset: self.name.clone(),
            remaining_pct,
            at: Utc::now(),
        });
        debug!(asset = %self.name, incident = %incident.id(), remaining_pct, "incident solved");

        if let AssetKind::DispatchDesk(desk) = &mut self.kind {
            self.events.emit(Event::PhoneHungUp { at: Utc::now() });
            desk.redistribute(&incident, &self.events);
        }
        Some(remaining_pct)
    }

    pub fn pause_incident(&self) {
        if let Some(incident) = &self.active {
            incident.pause();
        }
    }

    pub fn unpause_incident(&self) {
        if let Some(incident) = &self.active {
            incident.unpause();
        }
    }

    /// Discard every pending incident and stop the active one. Pending
    /// incidents were never started and are simply dropped.
    pub fn stop_and_remove_all_incidents(&mut self) {
        let discarded = self.pending.len();
        self.pending.clear();
        if let Some(active) = self.active.take() {
            active.stop();
            if self.is_dispatch_desk() {
                self.events.emit(Event::PhoneHungUp { at: Utc::now() });
            }
        }
        debug!(asset = %self.name, discarded, "asset cleared");
    }

    fn promote(&mut self, incident: Incident) {
        incident.start(&self.scheduler);
        self.events.emit(Event::IncidentStarted {
            incident_id: incident.id(),
            asset: self.name.clone(),
            at: Utc::now(),
        });
        if self.is_dispatch_desk() {
            self.events.emit(Event::PhoneRinging { at: Utc::now() });
        }
        for observer in &mut self.observers {
            observer.on_incoming(&self.name);
        }
        self.active = Some(incident);
    }

    fn retire_expired(&mut self, incident: Incident) {
        for observer in &mut self.observers {
            observer.on_expiring(&self.name);
        }
        incident.stop();
        self.events.emit(Event::IncidentExpired {
            incident_id: incident.id(),
            asset: self.name.clone(),
            at: Utc::now(),
        });
        if self.is_dispatch_desk() {
            self.events.emit(Event::PhoneHungUp { at: Utc::now() });
        }
        debug!(asset = %self.name, incident = %incident.id(), "incident expired");
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("dispatch_desk", &self.is_dispatch_desk())
            .field("pending", &self.pending.len())
            .field("active", &self.active.as_ref().map(Incident::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SpawnerConfig;
    use crate::timer::TaskState;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl IncidentObserver for Recorder {
        fn on_incoming(&mut self, asset: &str) {
            self.0.lock().unwrap().push(format!("incoming:{asset}"));
        }
        fn on_expiring(&mut self, asset: &str) {
            self.0.lock().unwrap().push(format!("expiring:{asset}"));
        }
        fn on_solving(&mut self, asset: &str, remaining_pct: u32) {
            self.0.lock().unwrap().push(format!("solving:{asset}:{remaining_pct}"));
        }
    }

    fn incident(secs: u64) -> Incident {
        Incident::new(Expertise::Servers, Duration::from_secs(secs)).unwrap()
    }

    fn workstation(scheduler: &Scheduler) -> Asset {
        Asset::workstation("rack", (3, 4), scheduler.clone(), EventSink::new())
    }

    #[test]
    fn pending_incidents_wait_in_arrival_order() {
        let scheduler = Scheduler::default();
        let mut asset = workstation(&scheduler);
        let incidents: Vec<_> = (0..3).map(|_| incident(60)).collect();
        for i in &incidents {
            asset.add_incident(i.clone());
        }
        assert_eq!(asset.pending_len(), 3);
        assert!(asset.active_incident().is_none());

        assert_eq!(asset.update(), 0);
        assert_eq!(asset.active_incident(), Some(&incidents[0]));
        assert_eq!(incidents[0].state(), TaskState::Running);
        assert_eq!(incidents[1].state(), TaskState::Idle);
        assert_eq!(asset.pending_len(), 2);

        // Still busy: nothing else is promoted.
        asset.update();
        assert_eq!(asset.active_incident(), Some(&incidents[0]));
    }

    #[test]
    fn expiry_is_reported_once() {
        let scheduler = Scheduler::default();
        let mut asset = workstation(&scheduler);
        let recorder = Recorder::default();
        asset.register_observer(Box::new(recorder.clone()));
        let first = incident(1);
        asset.add_incident(first.clone());
        asset.add_incident(incident(60));

        asset.update();
        scheduler.advance(Duration::from_secs(2));
        assert_eq!(asset.update(), 1);
        assert!(first.is_stopped());
        assert!(asset.active_incident().is_none());
        assert_eq!(asset.update(), 0);
        assert_eq!(asset.pending_len(), 0);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["incoming:rack", "expiring:rack", "incoming:rack"]
        );
    }

    #[test]
    fn solving_rewards_floored_percentage() {
        let scheduler = Scheduler::default();
        let mut asset = workstation(&scheduler);
        let recorder = Recorder::default();
        asset.register_observer(Box::new(recorder.clone()));
        let active = incident(100);
        asset.add_incident(active.clone());
        asset.update();
        scheduler.advance(Duration::from_millis(30_500));

        assert_eq!(asset.solve_incident(), Some(69));
        assert!(active.is_stopped());
        assert!(!active.has_expired());
        assert!(asset.active_incident().is_none());
        assert_eq!(asset.solve_incident(), None);
        assert_eq!(recorder.0.lock().unwrap().last().unwrap(), "solving:rack:69");
    }

    #[test]
    fn pause_and_unpause_target_the_active_incident() {
        let scheduler = Scheduler::default();
        let mut asset = workstation(&scheduler);
        asset.pause_incident();
        let active = incident(10);
        asset.add_incident(active.clone());
        asset.update();
        asset.pause_incident();
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(active.remaining_ms(), 10_000);
        asset.unpause_incident();
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(active.remaining_ms(), 5_000);
    }

    #[test]
    fn stop_and_remove_all_discards_without_expiring() {
        let scheduler = Scheduler::default();
        let mut asset = workstation(&scheduler);
        let held: Vec<_> = (0..4).map(|_| incident(30)).collect();
        for i in &held {
            asset.add_incident(i.clone());
        }
        asset.update();

        asset.stop_and_remove_all_incidents();
        assert_eq!(asset.pending_len(), 0);
        assert!(asset.active_incident().is_none());
        assert!(held.iter().all(|i| !i.has_expired()));
        assert!(held[0].is_stopped());
        assert_eq!(held[1].state(), TaskState::Idle);
    }

    #[test]
    fn timer_frame_follows_active_incident() {
        let scheduler = Scheduler::default();
        let mut asset = workstation(&scheduler);
        assert_eq!(asset.timer_frame(17), None);
        asset.add_incident(incident(16));
        asset.update();
        scheduler.advance(Duration::from_secs(8));
        assert_eq!(asset.timer_frame(17), Some(8));
    }

    #[test]
    fn dispatch_desk_redistributes_solved_calls() {
        let scheduler = Scheduler::default();
        let events = EventSink::new();
        let spawner = IncidentSpawner::new(
            SpawnerConfig::default(),
            300,
            Pcg64::seed_from_u64(1),
            events.clone(),
        )
        .unwrap();
        let desk = DispatchDesk::new(
            spawner.clone(),
            RedistributionConfig::default(),
            Pcg64::seed_from_u64(2),
        );
        let mut helpdesk =
            Asset::dispatch_desk("helpdesk", (0, 0), desk, scheduler.clone(), events.clone());
        let call = Incident::new(Expertise::Helpdesk, Duration::from_secs(20)).unwrap();
        helpdesk.add_incident(call.clone());
        helpdesk.update();
        helpdesk.solve_incident();

        let redistributed = spawner.get();
        assert_eq!(redistributed.len(), 1);
        let new = &redistributed[0];
        assert!(Expertise::REDISTRIBUTABLE.contains(&new.expertise()));
        assert!((60_000..=300_000).contains(&new.time_to_solve_ms()));
        assert_ne!(new.id(), call.id());

        let kinds: Vec<_> = events.drain().iter().map(Event::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "IncidentRouted",
                "IncidentStarted",
                "PhoneRinging",
                "IncidentSolved",
                "PhoneHungUp",
                "IncidentRedistributed"
            ]
        );
    }

    #[test]
    fn expired_call_hangs_up() {
        let scheduler = Scheduler::default();
        let events = EventSink::new();
        let spawner = IncidentSpawner::new(
            SpawnerConfig::default(),
            300,
            Pcg64::seed_from_u64(1),
            events.clone(),
        )
        .unwrap();
        let desk = DispatchDesk::new(
            spawner.clone(),
            RedistributionConfig::default(),
            Pcg64::seed_from_u64(2),
        );
        let mut helpdesk =
            Asset::dispatch_desk("helpdesk", (0, 0), desk, scheduler.clone(), events.clone());
        helpdesk.add_incident(Incident::new(Expertise::Helpdesk, Duration::from_secs(5)).unwrap());
        helpdesk.update();
        scheduler.advance(Duration::from_secs(5));
        assert_eq!(helpdesk.update(), 1);
        assert!(spawner.get().is_empty());
        let kinds: Vec<_> = events.drain().iter().map(Event::kind).collect();
        assert_eq!(kinds.last(), Some(&"PhoneHungUp"));
    }
}
