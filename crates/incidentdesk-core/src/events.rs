use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expertise::Expertise;
use crate::queue::SharedQueue;

/// Process-unique incident identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(pub u64);

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Remaining-time thresholds that trigger an urgency cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// 25% of the allotted time remains.
    Quarter,
    /// 10% of the allotted time remains.
    Tenth,
}

impl Urgency {
    pub fn percent(self) -> u32 {
        match self {
            Urgency::Quarter => 25,
            Urgency::Tenth => 10,
        }
    }
}

/// Every state change visible to collaborators (audio, UI, logs) produces an Event.
/// The frame loop drains them; nothing in the core waits on a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    IncidentSpawned {
        incident_id: IncidentId,
        expertise: Expertise,
        time_to_solve_ms: u64,
        at: DateTime<Utc>,
    },
    IncidentRouted {
        incident_id: IncidentId,
        expertise: Expertise,
        asset: String,
        at: DateTime<Utc>,
    },
    IncidentStarted {
        incident_id: IncidentId,
        asset: String,
        at: DateTime<Utc>,
    },
    /// Emitted from the incident's own tick, at most once per threshold.
    IncidentUrgent {
        incident_id: IncidentId,
        expertise: Expertise,
        urgency: Urgency,
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    IncidentExpired {
        incident_id: IncidentId,
        asset: String,
        at: DateTime<Utc>,
    },
    IncidentSolved {
        incident_id: IncidentId,
        asset: String,
        remaining_pct: u32,
        at: DateTime<Utc>,
    },
    /// A dispatch-desk call turned into a workstation incident.
    IncidentRedistributed {
        from: IncidentId,
        incident_id: IncidentId,
        expertise: Expertise,
        time_to_solve_ms: u64,
        at: DateTime<Utc>,
    },
    PhoneRinging {
        at: DateTime<Utc>,
    },
    PhoneHungUp {
        at: DateTime<Utc>,
    },
    WorkStarted {
        character: String,
        incident_id: IncidentId,
        required_ms: u64,
        at: DateTime<Utc>,
    },
    WorkCancelled {
        character: String,
        incident_id: IncidentId,
        at: DateTime<Utc>,
    },
    WorkCompleted {
        character: String,
        incident_id: IncidentId,
        at: DateTime<Utc>,
    },
    LevelStarted {
        level: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    LevelCompleted {
        level: u32,
        score: u64,
        mistakes: u32,
        at: DateTime<Utc>,
    },
    GamePaused {
        at: DateTime<Utc>,
    },
    GameResumed {
        at: DateTime<Utc>,
    },
    GameOver {
        level: u32,
        score: u64,
        mistakes: u32,
        at: DateTime<Utc>,
    },
    Victory {
        score: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short machine name of the variant, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::IncidentSpawned { .. } => "IncidentSpawned",
            Event::IncidentRouted { .. } => "IncidentRouted",
            Event::IncidentStarted { .. } => "IncidentStarted",
            Event::IncidentUrgent { .. } => "IncidentUrgent",
            Event::IncidentExpired { .. } => "IncidentExpired",
            Event::IncidentSolved { .. } => "IncidentSolved",
            Event::IncidentRedistributed { .. } => "IncidentRedistributed",
            Event::PhoneRinging { .. } => "PhoneRinging",
            Event::PhoneHungUp { .. } => "PhoneHungUp",
            Event::WorkStarted { .. } => "WorkStarted",
            Event::WorkCancelled { .. } => "WorkCancelled",
            Event::WorkCompleted { .. } => "WorkCompleted",
            Event::LevelStarted { .. } => "LevelStarted",
            Event::LevelCompleted { .. } => "LevelCompleted",
            Event::GamePaused { .. } => "GamePaused",
            Event::GameResumed { .. } => "GameResumed",
            Event::GameOver { .. } => "GameOver",
            Event::Victory { .. } => "Victory",
        }
    }
}

/// Clonable handle through which any task publishes events.
///
/// A disabled sink swallows everything, which keeps standalone incidents and
/// progress bars usable without a session.
#[derive(Clone, Default)]
pub struct EventSink {
    queue: Option<SharedQueue<Event>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self {
            queue: Some(SharedQueue::new()),
        }
    }

    pub fn disabled() -> Self {
        Self { queue: None }
    }

    pub fn emit(&self, event: Event) {
        if let Some(queue) = &self.queue {
            queue.push(event);
        }
    }

    /// Take every event published since the last drain.
    pub fn drain(&self) -> Vec<Event> {
        self.queue.as_ref().map(SharedQueue::drain).unwrap_or_default()
    }

    pub fn close(&self) {
        if let Some(queue) = &self.queue {
            queue.close();
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("enabled", &self.queue.is_some())
            .finish()
    }
}
