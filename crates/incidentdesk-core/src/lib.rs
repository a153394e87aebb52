//! # Incidentdesk Core Library
//!
//! Incident timing and distribution engine for an office-simulation game.
//! Incidents are generated at a variable rate, routed to assets, worked by
//! characters and resolved or left to expire against a level countdown.
//!
//! ## Architecture
//!
//! - **Timers**: every timed entity implements [`TimedTask`] and is driven by
//!   one cooperative [`Scheduler`] from a shared tick source
//! - **Pipeline**: [`IncidentSpawner`] → [`Session`] routing → [`Asset`]
//!   queues → [`Character`] work → resolution and [`Score`]
//! - **Context**: [`GameContext`] owns the process-wide scheduler, spawner,
//!   event sink and seeded random streams
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Incident`]: decaying unit of work with urgency cues
//! - [`IncidentSpawner`]: accelerating incident generator
//! - [`Session`]: per-frame orchestration, levels and pause broadcast
//! - [`Config`]: game configuration management

#[macro_use]
pub mod timer;

pub mod asset;
pub mod character;
pub mod context;
pub mod display;
pub mod error;
pub mod events;
pub mod expertise;
pub mod incident;
pub mod layout;
pub mod queue;
pub mod score;
pub mod session;
pub mod spawner;
pub mod storage;

pub use asset::{Asset, AssetKind, DispatchDesk, IncidentObserver, Position};
pub use character::{Character, CharacterSpec};
pub use context::GameContext;
pub use error::{ConfigError, CoreError, ValidationError};
pub use events::{Event, EventSink, IncidentId, Urgency};
pub use expertise::Expertise;
pub use incident::Incident;
pub use layout::{AssetSpec, LevelLayout};
pub use queue::SharedQueue;
pub use score::Score;
pub use session::{Session, SessionStatus, SessionSummary, SolveOutcome};
pub use spawner::{pacing_multiplier, IncidentSpawner};
pub use storage::{Config, PacingMode};
pub use timer::{Countdown, ProgressBar, Scheduler, TaskState, TimedTask};
