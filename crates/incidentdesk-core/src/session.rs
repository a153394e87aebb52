//! Headless game session: the polling side of the incident engine.
//!
//! A host calls [`Session::frame`] once per frame. Each frame routes the
//! spawner's output to assets, resolves finished work, updates every asset
//! and then evaluates the level outcome. Player input arrives through
//! [`Session::solve_action`], [`Session::pause`] and [`Session::resume`].
//!
//! ## Status Transitions
//!
//! ```text
//! Ready -> Running <-> Paused
//!             |
//!             +-> Victory | GameOver
//! (any) -> Stopped
//! ```

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::asset::{Asset, DispatchDesk};
use crate::character::Character;
use crate::context::GameContext;
use crate::error::{Result, ValidationError};
use crate::events::{Event, EventSink};
use crate::incident::Incident;
use crate::layout::LevelLayout;
use crate::score::Score;
use crate::spawner::IncidentSpawner;
use crate::storage::LevelConfig;
use crate::timer::{Countdown, Scheduler, TimedTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Ready,
    Running,
    Paused,
    Victory,
    GameOver,
    Stopped,
}

impl SessionStatus {
    /// Whether the session can no longer change.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            SessionStatus::Victory | SessionStatus::GameOver | SessionStatus::Stopped
        )
    }
}

/// Result of a player's solve action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SolveOutcome {
    /// Incident resolved on the spot (dispatch desk).
    Solved { remaining_pct: u32 },
    WorkStarted { required_ms: u64 },
    WorkCancelled,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub level: u32,
    pub score: u64,
    pub mistakes: u32,
}

pub struct Session {
    id: Uuid,
    levels: LevelConfig,
    scheduler: Scheduler,
    spawner: IncidentSpawner,
    events: EventSink,
    countdown: Countdown,
    /// Index 0 is the dispatch desk.
    assets: Vec<Asset>,
    characters: Vec<Character>,
    score: Score,
    level: u32,
    mistakes: u32,
    status: SessionStatus,
    /// Tasks paused by the last game pause, resumed together.
    paused_tasks: Vec<Arc<dyn TimedTask>>,
    routing_rng: Pcg64,
    timer_frames: usize,
}

impl Session {
    /// # Errors
    ///
    /// Returns an error if `layout` has no workstation or no character.
    pub fn new(context: &GameContext, layout: &LevelLayout) -> Result<Self> {
        layout.validate()?;
        let config = context.config();
        let scheduler = context.scheduler().clone();
        let events = context.events().clone();
        let spawner = context.spawner().clone();
        let score = Score::new();

        let desk = DispatchDesk::new(spawner.clone(), config.redistribution.clone(), context.rng());
        let mut assets = vec![Asset::dispatch_desk(
            layout.dispatch_desk.name.clone(),
            layout.dispatch_desk.position,
            desk,
            scheduler.clone(),
            events.clone(),
        )];
        assets.extend(layout.workstations.iter().map(|spec| {
            Asset::workstation(spec.name.clone(), spec.position, scheduler.clone(), events.clone())
        }));
        for asset in &mut assets {
            asset.register_observer(Box::new(score.clone()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            levels: config.level.clone(),
            countdown: Countdown::new(config.level.duration_secs)?,
            characters: layout.characters.iter().map(Character::from_spec).collect(),
            routing_rng: context.rng(),
            timer_frames: config.display.timer_frames,
            scheduler,
            spawner,
            events,
            assets,
            score,
            level: 1,
            mistakes: 0,
            status: SessionStatus::Ready,
            paused_tasks: Vec::new(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn score(&self) -> u64 {
        self.score.points()
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// Clock face for the incident active at `asset`, if any.
    pub fn asset_timer_frame(&self, asset: usize) -> Option<usize> {
        self.assets.get(asset)?.timer_frame(self.timer_frames)
    }

    /// Fill frame of the bar `character` is working, if any.
    pub fn progress_frame(&self, character: usize) -> Option<usize> {
        let bar = self.characters.get(character)?.progress_bar()?;
        Some(bar.frame(self.timer_frames))
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            status: self.status,
            level: self.level,
            score: self.score(),
            mistakes: self.mistakes,
        }
    }

    /// Events published since the previous drain, in publication order.
    pub fn drain_events(&self) -> Vec<Event> {
        self.events.drain()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start level 1: the countdown and the spawner begin running.
    pub fn start(&mut self) {
        if self.status != SessionStatus::Ready {
            return;
        }
        self.countdown.start(&self.scheduler);
        self.spawner.start(&self.scheduler);
        self.spawner.unpause();
        self.spawner.reset();
        self.status = SessionStatus::Running;
        self.announce_level();
    }

    /// Advance the game by one frame and report where it stands.
    pub fn frame(&mut self) -> SessionStatus {
        if self.status != SessionStatus::Running {
            return self.status;
        }

        for incident in self.spawner.get() {
            self.route(incident);
        }
        self.complete_finished_work();
        for asset in &mut self.assets {
            self.mistakes += asset.update();
        }
        self.release_abandoned_work();

        if self.mistakes >= self.levels.max_mistakes {
            self.game_over();
        } else if self.countdown.timeout() {
            self.complete_level();
        }
        self.status
    }

    /// `character` acts on `asset`.
    ///
    /// The dispatch desk answers a call immediately. Elsewhere the action
    /// toggles work on the active incident: it starts when the character is
    /// free and the incident unworked, and is cancelled when the character
    /// is already working that incident.
    ///
    /// # Errors
    ///
    /// Returns an error if either index is out of range.
    pub fn solve_action(&mut self, character: usize, asset: usize) -> Result<SolveOutcome> {
        let character_count = self.characters.len();
        let asset_count = self.assets.len();
        let worker = self
            .characters
            .get_mut(character)
            .ok_or_else(|| out_of_range("character", character, character_count))?;
        let target = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| out_of_range("asset", asset, asset_count))?;

        if self.status != SessionStatus::Running {
            return Ok(SolveOutcome::Ignored);
        }
        let Some(active) = target.active_incident().cloned() else {
            return Ok(SolveOutcome::Ignored);
        };

        if target.is_dispatch_desk() {
            if active.is_paused() {
                return Ok(SolveOutcome::Ignored);
            }
            return Ok(target
                .solve_incident()
                .map_or(SolveOutcome::Ignored, |remaining_pct| SolveOutcome::Solved {
                    remaining_pct,
                }));
        }

        if worker.working_incident() == Some(&active) {
            worker.remove_progress_bar();
            active.unpause();
            self.events.emit(Event::WorkCancelled {
                character: worker.name().to_string(),
                incident_id: active.id(),
                at: Utc::now(),
            });
            return Ok(SolveOutcome::WorkCancelled);
        }
        if active.is_paused() || worker.is_working() {
            return Ok(SolveOutcome::Ignored);
        }

        active.pause();
        let required_ms = worker.add_progress_bar(&active, &self.scheduler).required_ms();
        self.events.emit(Event::WorkStarted {
            character: worker.name().to_string(),
            incident_id: active.id(),
            required_ms,
            at: Utc::now(),
        });
        Ok(SolveOutcome::WorkStarted { required_ms })
    }

    /// Pause every running timer. Only tasks that were running are paused,
    /// so [`resume`](Self::resume) restores exactly the prior state.
    pub fn pause(&mut self) {
        if self.status != SessionStatus::Running {
            return;
        }
        let mut tasks = vec![self.countdown.as_task(), self.spawner.as_task()];
        tasks.extend(
            self.assets
                .iter()
                .filter_map(Asset::active_incident)
                .map(Incident::as_task),
        );
        tasks.extend(
            self.characters
                .iter()
                .filter_map(Character::progress_bar)
                .map(|bar| bar.as_task()),
        );
        tasks.retain(|task| !task.is_paused() && !task.is_stopped());
        for task in &tasks {
            task.pause();
        }
        debug!(paused = tasks.len(), "timers paused");
        self.paused_tasks = tasks;
        self.status = SessionStatus::Paused;
        self.events.emit(Event::GamePaused { at: Utc::now() });
        info!(session = %self.id, "game paused");
    }

    pub fn resume(&mut self) {
        if self.status != SessionStatus::Paused {
            return;
        }
        for task in self.paused_tasks.drain(..) {
            task.unpause();
        }
        self.status = SessionStatus::Running;
        self.events.emit(Event::GameResumed { at: Utc::now() });
        info!(session = %self.id, "game resumed");
    }

    /// Stop every timer of the session and the tick driver.
    pub fn stop(&mut self) {
        if !self.status.is_finished() {
            self.status = SessionStatus::Stopped;
        }
        self.shut_down();
    }

    // ── Internals ────────────────────────────────────────────────────

    fn route(&mut self, incident: Incident) {
        let index = if incident.expertise().is_dispatch() {
            0
        } else {
            self.routing_rng.gen_range(1..self.assets.len())
        };
        self.assets[index].add_incident(incident);
    }

    /// Resolve incidents whose worker has invested all required time.
    fn complete_finished_work(&mut self) {
        for character in &mut self.characters {
            if !character.has_finished_work() {
                continue;
            }
            let Some(working) = character.working_incident().cloned() else {
                continue;
            };
            let Some(asset) = self
                .assets
                .iter_mut()
                .find(|asset| asset.active_incident() == Some(&working))
            else {
                continue;
            };
            character.remove_progress_bar();
            working.unpause();
            self.events.emit(Event::WorkCompleted {
                character: character.name().to_string(),
                incident_id: working.id(),
                at: Utc::now(),
            });
            asset.solve_incident();
        }
    }

    /// Drop work on incidents that are no longer active anywhere.
    fn release_abandoned_work(&mut self) {
        for character in &mut self.characters {
            let Some(working) = character.working_incident() else {
                continue;
            };
            if !working.is_stopped() {
                continue;
            }
            if let Some(incident) = character.remove_progress_bar() {
                self.events.emit(Event::WorkCancelled {
                    character: character.name().to_string(),
                    incident_id: incident.id(),
                    at: Utc::now(),
                });
            }
        }
    }

    fn announce_level(&self) {
        self.events.emit(Event::LevelStarted {
            level: self.level,
            duration_secs: self.levels.duration_secs,
            at: Utc::now(),
        });
        info!(session = %self.id, level = self.level, "level started");
    }

    fn complete_level(&mut self) {
        let score = self.score();
        self.events.emit(Event::LevelCompleted {
            level: self.level,
            score,
            mistakes: self.mistakes,
            at: Utc::now(),
        });
        info!(
            session = %self.id,
            level = self.level,
            score,
            mistakes = self.mistakes,
            "level completed"
        );
        self.tear_down_level();

        if self.level >= self.levels.max_levels {
            self.status = SessionStatus::Victory;
            self.events.emit(Event::Victory {
                score,
                at: Utc::now(),
            });
            info!(session = %self.id, score, "victory");
            self.shut_down();
            return;
        }

        self.level += 1;
        self.countdown.reset_timer();
        self.spawner.unpause();
        self.spawner.reset();
        self.mistakes = 0;
        self.announce_level();
    }

    fn game_over(&mut self) {
        let score = self.score();
        self.status = SessionStatus::GameOver;
        self.events.emit(Event::GameOver {
            level: self.level,
            score,
            mistakes: self.mistakes,
            at: Utc::now(),
        });
        info!(session = %self.id, level = self.level, score, mistakes = self.mistakes, "game over");
        self.shut_down();
    }

    /// Clear every asset and the spawner backlog between levels.
    fn tear_down_level(&mut self) {
        self.spawner.pause();
        for character in &mut self.characters {
            if let Some(incident) = character.remove_progress_bar() {
                self.events.emit(Event::WorkCancelled {
                    character: character.name().to_string(),
                    incident_id: incident.id(),
                    at: Utc::now(),
                });
            }
        }
        for asset in &mut self.assets {
            asset.stop_and_remove_all_incidents();
        }
        let discarded = self.spawner.get().len();
        debug!(discarded, "spawner backlog discarded");
    }

    fn shut_down(&mut self) {
        self.tear_down_level();
        self.paused_tasks.clear();
        self.spawner.stop();
        self.countdown.stop();
        self.scheduler.shutdown();
    }
}

fn out_of_range(field: &str, index: usize, len: usize) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: format!("index {index} out of range ({len} available)"),
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("level", &self.level)
            .field("score", &self.score())
            .field("mistakes", &self.mistakes)
            .field("assets", &self.assets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Config, PacingMode};
    use std::time::Duration;

    fn context_with(duration_secs: u64, max_mistakes: u32) -> GameContext {
        let mut config = Config {
            seed: Some(7),
            ..Config::default()
        };
        config.level.duration_secs = duration_secs;
        config.level.max_levels = 2;
        config.level.max_mistakes = max_mistakes;
        config.spawner.pacing = PacingMode::Fixed;
        config.spawner.min_between_secs = 5;
        config.spawner.max_between_secs = 5;
        GameContext::new(config).unwrap()
    }

    fn context(duration_secs: u64) -> GameContext {
        context_with(duration_secs, 3)
    }

    fn run_secs(ctx: &GameContext, session: &mut Session, secs: u64) {
        for _ in 0..secs * 4 {
            ctx.scheduler().advance(Duration::from_millis(250));
            session.frame();
        }
    }

    fn started(ctx: &GameContext) -> Session {
        let mut session = Session::new(ctx, &LevelLayout::standard()).unwrap();
        session.start();
        session
    }

    #[test]
    fn first_call_rings_at_the_dispatch_desk() {
        let ctx = context(60);
        let mut session = started(&ctx);
        assert_eq!(session.status(), SessionStatus::Running);
        run_secs(&ctx, &mut session, 2);

        let desk = &session.assets()[0];
        assert!(desk.is_dispatch_desk());
        assert!(desk.active_incident().is_some());
        let kinds: Vec<_> = session.drain_events().iter().map(Event::kind).collect();
        assert!(kinds.contains(&"LevelStarted"));
        assert!(kinds.contains(&"PhoneRinging"));
    }

    #[test]
    fn frames_follow_the_configured_frame_count() {
        let ctx = context(60);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 2);

        let face = session.asset_timer_frame(0).unwrap();
        assert!(face < ctx.config().display.timer_frames);
        assert_eq!(session.asset_timer_frame(1), None);
        assert_eq!(session.asset_timer_frame(99), None);
        assert_eq!(session.progress_frame(0), None);
    }

    #[test]
    fn answering_a_call_scores_and_redistributes() {
        let ctx = context(60);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 2);

        let outcome = session.solve_action(0, 0).unwrap();
        assert!(matches!(outcome, SolveOutcome::Solved { remaining_pct } if remaining_pct > 0));
        assert!(session.score() > 0);

        session.frame();
        let routed = session.assets()[1..]
            .iter()
            .filter(|a| a.active_incident().is_some() || a.pending_len() > 0)
            .count();
        assert_eq!(routed, 1);
    }

    #[test]
    fn work_toggles_and_completes() {
        let ctx = context_with(120, 100);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 2);
        session.solve_action(0, 0).unwrap();
        session.frame();
        session.frame();

        let index = session
            .assets()
            .iter()
            .position(|a| !a.is_dispatch_desk() && a.active_incident().is_some())
            .unwrap();
        let incident = session.assets()[index].active_incident().cloned().unwrap();
        let superhero = session
            .characters()
            .iter()
            .position(|c| c.expertise() == crate::expertise::Expertise::Superhero)
            .unwrap();

        let started = session.solve_action(superhero, index).unwrap();
        let SolveOutcome::WorkStarted { required_ms } = started else {
            panic!("unexpected outcome {started:?}");
        };
        assert_eq!(required_ms, incident.time_to_solve_ms() / 10);
        assert!(incident.is_paused());

        // Another character cannot take over paused work.
        assert_eq!(session.solve_action(0, index).unwrap(), SolveOutcome::Ignored);
        assert_eq!(session.solve_action(superhero, index).unwrap(), SolveOutcome::WorkCancelled);
        assert!(!incident.is_paused());

        session.solve_action(superhero, index).unwrap();
        let before = session.score();
        run_secs(&ctx, &mut session, required_ms.div_ceil(1000) + 1);
        assert!(incident.is_stopped());
        assert!(!incident.has_expired());
        assert!(session.score() > before);
        assert!(!session.characters()[superhero].is_working());
    }

    #[test]
    fn pause_restores_exactly_the_running_timers() {
        let ctx = context_with(120, 100);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 2);
        session.solve_action(0, 0).unwrap();
        session.frame();
        session.frame();
        let index = session
            .assets()
            .iter()
            .position(|a| !a.is_dispatch_desk() && a.active_incident().is_some())
            .unwrap();
        let worked = session.assets()[index].active_incident().cloned().unwrap();
        session.solve_action(1, index).unwrap();

        let remaining = session.countdown().remaining_secs();
        session.pause();
        assert_eq!(session.status(), SessionStatus::Paused);
        assert!(session.solve_action(1, index).unwrap() == SolveOutcome::Ignored);
        for _ in 0..40 {
            ctx.scheduler().advance(Duration::from_millis(250));
            assert_eq!(session.frame(), SessionStatus::Paused);
        }
        assert_eq!(session.countdown().remaining_secs(), remaining);
        let bar = session.characters()[1].progress_bar().cloned().unwrap();
        let bar_remaining = bar.remaining_ms();

        session.resume();
        assert_eq!(session.status(), SessionStatus::Running);
        // Work-paused incident stays paused, its bar runs again.
        assert!(worked.is_paused());
        assert!(!bar.is_paused());
        ctx.scheduler().advance(Duration::from_secs(1));
        assert!(bar.remaining_ms() < bar_remaining);
    }

    #[test]
    fn countdown_timeout_advances_level_then_wins() {
        let ctx = context(10);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 10);
        assert_eq!(session.level(), 2);
        assert_eq!(session.mistakes(), 0);
        assert_eq!(session.countdown().remaining_secs(), 10);
        assert!(session.assets().iter().all(|a| a.active_incident().is_none()));

        run_secs(&ctx, &mut session, 10);
        assert_eq!(session.status(), SessionStatus::Victory);
        assert!(ctx.spawner().is_stopped());
        let kinds: Vec<_> = session.drain_events().iter().map(Event::kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == "LevelCompleted").count(), 2);
        assert_eq!(kinds.last(), Some(&"Victory"));
    }

    #[test]
    fn unanswered_calls_end_the_game() {
        let ctx = context(300);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 300);
        assert_eq!(session.status(), SessionStatus::GameOver);
        assert_eq!(session.mistakes(), 3);
        assert_eq!(session.frame(), SessionStatus::GameOver);
        let summary = session.summary();
        assert_eq!(summary.status, SessionStatus::GameOver);
        assert_eq!(summary.level, 1);
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let ctx = context(60);
        let mut session = started(&ctx);
        assert!(session.solve_action(99, 0).is_err());
        assert!(session.solve_action(0, 99).is_err());
    }

    #[test]
    fn stop_halts_everything() {
        let ctx = context(60);
        let mut session = started(&ctx);
        run_secs(&ctx, &mut session, 3);
        session.stop();
        assert_eq!(session.status(), SessionStatus::Stopped);
        assert!(session.countdown().is_stopped());
        assert!(ctx.scheduler().is_shut_down());
        assert_eq!(session.frame(), SessionStatus::Stopped);
    }
}
