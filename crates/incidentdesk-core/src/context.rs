//! Process-scoped game context.
//!
//! Built once at startup from a validated [`Config`] and handed to the
//! session. It owns the scheduler, the single incident spawner and the event
//! sink, and derives every random stream from one seed so a run can be
//! replayed.

use std::sync::atomic::{AtomicU64, Ordering};

use rand_pcg::Pcg64;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::Result;
use crate::events::EventSink;
use crate::spawner::IncidentSpawner;
use crate::storage::Config;
use crate::timer::{Scheduler, TimedTask};

#[derive(Debug)]
pub struct GameContext {
    config: Config,
    seed: u64,
    next_stream: AtomicU64,
    scheduler: Scheduler,
    spawner: IncidentSpawner,
    events: EventSink,
}

impl GameContext {
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let scheduler = Scheduler::new(config.timing.tick(), config.timing.time_scale);
        let events = EventSink::new();
        let next_stream = AtomicU64::new(0);
        let spawner_rng = Self::stream(seed, &next_stream);
        let spawner = IncidentSpawner::new(
            config.spawner.clone(),
            config.level.duration_secs,
            spawner_rng,
            events.clone(),
        )?;
        info!(
            seed,
            tick_ms = config.timing.tick_ms,
            time_scale = config.timing.time_scale,
            "game context ready"
        );
        Ok(Self {
            config,
            seed,
            next_stream,
            scheduler,
            spawner,
            events,
        })
    }

    fn stream(seed: u64, next_stream: &AtomicU64) -> Pcg64 {
        let stream = next_stream.fetch_add(1, Ordering::Relaxed);
        Pcg64::new(u128::from(seed), u128::from(stream))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Seed every random stream of this context derives from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn spawner(&self) -> &IncidentSpawner {
        &self.spawner
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    /// A fresh random stream. Streams are handed out in a fixed order, so
    /// the same seed yields the same sequence of generators.
    pub fn rng(&self) -> Pcg64 {
        Self::stream(self.seed, &self.next_stream)
    }

    /// Start the background tick driver on the current tokio runtime.
    pub fn spawn_scheduler(&self) -> JoinHandle<()> {
        self.scheduler.spawn()
    }

    /// Stop the spawner and the tick driver, and close the event sink so
    /// anything published afterwards is dropped.
    pub fn shutdown(&self) {
        self.spawner.stop();
        self.scheduler.shutdown();
        self.events.close();
    }
}
