use crate::{AbilityKind, AiBehavior, DamageType, Line, Stat};
use serde::{Deserialize, Serialize};

/// An enemy archetype loaded from `data/enemies/<key>.ron`.
///
/// Hit points and experience are ranges: each spawned instance samples its own
/// hit points, and each kill samples its experience award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyTemplate {
    pub name: String,
    pub hp_min: u32,
    pub hp_max: u32,
    pub xp_min: u32,
    pub xp_max: u32,
    pub armor: i32,
    pub speed: i32,
    pub attack_bonus: i32,
    pub damage_min: u32,
    pub damage_max: u32,
    #[serde(default)]
    pub damage_type: DamageType,
    #[serde(default)]
    pub stamina: u32,
    #[serde(default)]
    pub formation: Line,
    #[serde(default)]
    pub ai: AiBehavior,
    #[serde(default)]
    pub action_skills: Vec<AbilityKind>,
    #[serde(default)]
    pub side_skills: Vec<AbilityKind>,
    #[serde(default)]
    pub resistances: Vec<DamageType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponData {
    pub name: String,
    pub stat: Stat,
    pub damage_min: u32,
    pub damage_max: u32,
    #[serde(default)]
    pub damage_type: DamageType,
}

/// A named group of enemy template keys spawned together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub name: String,
    pub enemies: Vec<String>,
}
