//! Player-controlled characters and the work they carry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::asset::Position;
use crate::expertise::Expertise;
use crate::incident::Incident;
use crate::timer::{ProgressBar, Scheduler, TimedTask};

/// Static description of a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub name: String,
    pub expertise: Expertise,
    pub position: Position,
}

#[derive(Debug)]
pub struct Character {
    name: String,
    expertise: Expertise,
    position: Position,
    progress_bar: Option<ProgressBar>,
    working: Option<Incident>,
}

impl Character {
    pub fn new(name: impl Into<String>, expertise: Expertise, position: Position) -> Self {
        Self {
            name: name.into(),
            expertise,
            position,
            progress_bar: None,
            working: None,
        }
    }

    pub fn from_spec(spec: &CharacterSpec) -> Self {
        Self::new(spec.name.clone(), spec.expertise, spec.position)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expertise(&self) -> Expertise {
        self.expertise
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn progress_bar(&self) -> Option<&ProgressBar> {
        self.progress_bar.as_ref()
    }

    pub fn working_incident(&self) -> Option<&Incident> {
        self.working.as_ref()
    }

    pub fn is_working(&self) -> bool {
        self.progress_bar.is_some()
    }

    /// Whether all required work on the current incident is done.
    pub fn has_finished_work(&self) -> bool {
        self.progress_bar.as_ref().is_some_and(ProgressBar::is_solved)
    }

    /// Start working `incident`, replacing any previous work. Returns the
    /// new bar, already running on `scheduler`.
    pub fn add_progress_bar(&mut self, incident: &Incident, scheduler: &Scheduler) -> &ProgressBar {
        self.remove_progress_bar();
        let bar = ProgressBar::for_incident(incident, self.expertise);
        bar.start(scheduler);
        debug!(
            character = %self.name,
            incident = %incident.id(),
            required_ms = bar.required_ms(),
            "work started"
        );
        self.working = Some(incident.clone());
        self.progress_bar.insert(bar)
    }

    /// Drop the current bar, stopping it. Returns the incident that was
    /// being worked.
    pub fn remove_progress_bar(&mut self) -> Option<Incident> {
        if let Some(bar) = self.progress_bar.take() {
            bar.stop();
        }
        let incident = self.working.take();
        if let Some(incident) = &incident {
            debug!(character = %self.name, incident = %incident.id(), "work ended");
        }
        incident
    }
}
