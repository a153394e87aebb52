use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Skill tag carried by incidents and characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expertise {
    /// Call queue. Every freshly spawned incident lands here first.
    Helpdesk,
    Networking,
    Database,
    Security,
    Servers,
    Workstations,
    /// Universal expert: works any incident at the specialist rate.
    Superhero,
}

impl Expertise {
    pub const ALL: [Expertise; 7] = [
        Expertise::Helpdesk,
        Expertise::Networking,
        Expertise::Database,
        Expertise::Security,
        Expertise::Servers,
        Expertise::Workstations,
        Expertise::Superhero,
    ];

    /// Categories the dispatch desk may turn a call into.
    pub const REDISTRIBUTABLE: [Expertise; 5] = [
        Expertise::Networking,
        Expertise::Database,
        Expertise::Security,
        Expertise::Servers,
        Expertise::Workstations,
    ];

    pub fn is_dispatch(self) -> bool {
        self == Expertise::Helpdesk
    }

    /// Whether a character with this expertise works `incident` at the
    /// specialist rate.
    pub fn matches(self, incident: Expertise) -> bool {
        self == Expertise::Superhero || self == incident
    }

    /// Draw a category for a redistributed call.
    pub fn random_redistributable<R: Rng + ?Sized>(rng: &mut R) -> Expertise {
        *Self::REDISTRIBUTABLE
            .choose(rng)
            .unwrap_or(&Expertise::Networking)
    }

    pub fn name(self) -> &'static str {
        match self {
            Expertise::Helpdesk => "HELPDESK",
            Expertise::Networking => "NETWORKING",
            Expertise::Database => "DATABASE",
            Expertise::Security => "SECURITY",
            Expertise::Servers => "SERVERS",
            Expertise::Workstations => "WORKSTATIONS",
            Expertise::Superhero => "SUPERHERO",
        }
    }
}

impl std::fmt::Display for Expertise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
