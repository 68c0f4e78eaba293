use crate::combat::combatant::CombatantId;
use crate::combat::state::SceneId;
use schema::{AbilityKind, ActionSlot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the skirmish combat engine.
///
/// Validation failures are not represented here: they are reason codes
/// carried by [`ActionRejection`] inside a normal outcome.
#[derive(Debug, Error)]
pub enum CombatError {
    /// A referenced character, template or weapon could not be resolved
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// Scene, graveyard, backup or character state could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// No active scene exists under the given identifier
    #[error("Scene not found: {0}")]
    SceneNotFound(SceneId),
    /// A stored scene violates its structural invariants
    #[error("Scene {scene} is corrupt: {details}")]
    CorruptScene { scene: SceneId, details: String },
}

/// Errors related to the external data sources combatants are built from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("Character not found: {0}")]
    CharacterNotFound(String),
    #[error("Enemy template not found: {0}")]
    EnemyTemplateNotFound(String),
    #[error("Weapon not found: {0}")]
    WeaponNotFound(String),
    #[error("No combat-ready party members for {0}")]
    EmptyParty(String),
    #[error("Encounter not found: {0}")]
    EncounterNotFound(String),
    #[error("Encounter table is empty")]
    NoEncounters,
    #[error("Malformed data: {0}")]
    MalformedData(String),
}

/// Errors raised while reading or writing durable state.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON encoding failure: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RON decoding failure: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Snapshot encoding failure: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("Store lock poisoned: {0}")]
    Poisoned(String),
}

impl PersistenceError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Reasons an action is refused. The scene is left untouched whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ActionRejection {
    #[error("The combat is already over")]
    CombatOver,
    #[error("It is not {actor}'s turn")]
    NotYourTurn { actor: CombatantId },
    #[error("The {0} has already been used this turn")]
    SlotAlreadyUsed(ActionSlot),
    #[error("Unknown ability `{0}`")]
    UnknownAbility(String),
    #[error("{0} is not one of your abilities")]
    AbilityNotKnown(AbilityKind),
    #[error("{ability} is on cooldown for {turns} more turns")]
    OnCooldown { ability: AbilityKind, turns: u8 },
    #[error("{ability} needs {needed} stamina but only {available} remains")]
    InsufficientStamina {
        ability: AbilityKind,
        needed: u32,
        available: u32,
    },
    #[error("No target selected")]
    MissingTarget,
    #[error("Target {0} is not in this combat")]
    TargetNotFound(CombatantId),
    #[error("Target {0} is already dead")]
    TargetDead(CombatantId),
}

/// Type alias for Results using CombatError
pub type CombatResult<T> = Result<T, CombatError>;

/// Type alias for Results using DataError
pub type DataResult<T> = Result<T, DataError>;

/// Type alias for Results using PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages_are_readable() {
        let rejection = ActionRejection::OnCooldown {
            ability: AbilityKind::SecondWind,
            turns: 2,
        };
        assert_eq!(rejection.to_string(), "Second Wind is on cooldown for 2 more turns");

        let slot = ActionRejection::SlotAlreadyUsed(ActionSlot::Side);
        assert_eq!(slot.to_string(), "The side action has already been used this turn");
    }

    #[test]
    fn test_data_errors_lift_into_combat_errors() {
        let err: CombatError = DataError::EnemyTemplateNotFound("ogre".to_string()).into();
        assert!(matches!(err, CombatError::Data(DataError::EnemyTemplateNotFound(_))));
        assert_eq!(err.to_string(), "Data error: Enemy template not found: ogre");
    }
}
