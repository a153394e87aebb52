//! Cooperative scheduler driving every [`TimedTask`] from one tick source.
//!
//! A single tokio task wakes every `tick` interval, measures the wall-clock
//! delta since its previous wake-up, scales it by `time_scale` and hands it to
//! every registered task. Stopped tasks are dropped on the next pass. Hosts
//! that already own a frame clock can skip [`Scheduler::spawn`] and call
//! [`Scheduler::advance`] themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::task::TimedTask;
use crate::queue::lock;

/// Default tick granularity for incident and progress timers.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

struct Inner {
    tasks: Mutex<Vec<Arc<dyn TimedTask>>>,
    tick: Duration,
    time_scale: f64,
    shutdown: Notify,
    stopped: AtomicBool,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// `tick` of zero is raised to one millisecond; a non-finite or negative
    /// `time_scale` falls back to real time.
    pub fn new(tick: Duration, time_scale: f64) -> Self {
        let tick = tick.max(Duration::from_millis(1));
        let time_scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            1.0
        };
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(Vec::new()),
                tick,
                time_scale,
                shutdown: Notify::new(),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn tick(&self) -> Duration {
        self.inner.tick
    }

    pub fn time_scale(&self) -> f64 {
        self.inner.time_scale
    }

    /// Add a task to the tick rotation. Ignored once shut down.
    pub fn register(&self, task: Arc<dyn TimedTask>) {
        if self.is_shut_down() {
            return;
        }
        lock(&self.inner.tasks).push(task);
    }

    /// Number of live registrations (stopped tasks count until the next pass).
    pub fn task_count(&self) -> usize {
        lock(&self.inner.tasks).len()
    }

    /// Deliver `elapsed` of simulated time to every live task.
    pub fn advance(&self, elapsed: Duration) {
        let live: Vec<Arc<dyn TimedTask>> = {
            let mut tasks = lock(&self.inner.tasks);
            tasks.retain(|t| !t.is_stopped());
            tasks.clone()
        };
        // Ticks run outside the registry lock so a task may be registered or
        // stopped from another thread mid-pass.
        for task in live {
            task.tick(elapsed);
        }
    }

    /// Start the background driver on the current tokio runtime.
    pub fn spawn(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.inner.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = Instant::now();
            debug!(tick_ms = scheduler.inner.tick.as_millis() as u64, "scheduler started");

            loop {
                tokio::select! {
                    _ = scheduler.inner.shutdown.notified() => break,
                    _ = interval.tick() => {}
                }
                if scheduler.is_shut_down() {
                    break;
                }
                let now = Instant::now();
                let delta = now.duration_since(last);
                last = now;
                // A scale too large for `Duration` delivers real time instead.
                let scaled =
                    Duration::try_from_secs_f64(delta.as_secs_f64() * scheduler.inner.time_scale)
                        .unwrap_or(delta);
                scheduler.advance(scaled);
            }

            debug!("scheduler stopped");
        })
    }

    /// Stop the driver immediately and forget every registration.
    /// Registered tasks keep their state; stopping them is the owner's job.
    pub fn shutdown(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.inner.tasks).clear();
        self.inner.shutdown.notify_one();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, 1.0)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tick", &self.inner.tick)
            .field("time_scale", &self.inner.time_scale)
            .field("tasks", &self.task_count())
            .field("stopped", &self.is_shut_down())
            .finish()
    }
}
