// In: src/lib.rs

//! Skirmish Combat Engine
//!
//! Turn-based tactical combat between a party of player characters and
//! template-spawned enemies. Scenes are persisted after every accepted
//! action, so a fight survives a restart and can be resumed by id.

// --- MODULE DECLARATIONS ---
pub mod catalog;
pub mod character;
pub mod combat;
pub mod config;
pub mod errors;
pub mod interface;
pub mod party;
pub mod store;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
// Static vocabulary shared by templates, characters and scenes.
pub use schema::{
    AbilityKind, ActionSlot, AiBehavior, ConditionKind, DamageType, EnemyTemplate, Encounter,
    Faction, Line, Stat, WeaponData,
};

// --- From this crate's modules (`src/`) ---

// The request/response surface.
pub use combat::actions::{ActionKind, ActionRequest};
pub use combat::combatant::CombatantId;
pub use combat::engine::{
    ActionOutcome, Collaborators, CombatEngine, OutcomeStatus, RecoveryReport, StartedCombat,
};
pub use combat::snapshot::{SceneStatus, Snapshot};
pub use combat::state::{CombatEvent, Scene, SceneId, Termination};

// Data sources and durable state.
pub use catalog::Catalog;
pub use character::{CharacterStore, InMemoryCharacterStore, JsonCharacterStore, PlayerCharacter};
pub use config::EngineConfig;
pub use party::{JsonPartyDirectory, Party, PartyDirectory, StaticParties};

// Crate-specific error and result types.
pub use errors::{
    ActionRejection, CombatError, CombatResult, DataError, DataResult, PersistenceError,
    PersistenceResult,
};
