//! Office layout: which assets and characters a level holds.
//!
//! Geometry and navigation come from the host; the core only needs names,
//! tile positions and expertise.

use serde::{Deserialize, Serialize};

use crate::asset::Position;
use crate::character::CharacterSpec;
use crate::error::ValidationError;
use crate::expertise::Expertise;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub dispatch_desk: AssetSpec,
    pub workstations: Vec<AssetSpec>,
    pub characters: Vec<CharacterSpec>,
}

const CHARACTER_NAMES: [&str; 7] = ["Alice", "Bruno", "Chloe", "Denis", "Emma", "Felix", "Gaby"];

impl LevelLayout {
    /// Dispatch desk, one workstation per redistributable expertise, and one
    /// character per expertise.
    pub fn standard() -> Self {
        let workstations = Expertise::REDISTRIBUTABLE
            .iter()
            .zip(0u32..)
            .map(|(expertise, i)| AssetSpec {
                name: expertise.name().to_lowercase(),
                position: (4 + 3 * i, 2),
            })
            .collect();
        let characters = Expertise::ALL
            .iter()
            .zip(CHARACTER_NAMES)
            .zip(0u32..)
            .map(|((&expertise, name), i)| CharacterSpec {
                name: name.to_string(),
                expertise,
                position: (2 + 2 * i, 6),
            })
            .collect();
        Self {
            dispatch_desk: AssetSpec {
                name: "helpdesk".into(),
                position: (1, 1),
            },
            workstations,
            characters,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the layout has no workstation or no character.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workstations.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "layout.workstations".into(),
                message: "at least one workstation is required".into(),
            });
        }
        if self.characters.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "layout.characters".into(),
                message: "at least one character is required".into(),
            });
        }
        Ok(())
    }
}

impl Default for LevelLayout {
    fn default() -> Self {
        Self::standard()
    }
}
