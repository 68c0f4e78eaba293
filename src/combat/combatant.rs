//! Combatants and the registry that builds them from external data.

use crate::catalog::Catalog;
use crate::character::{stat_bonus, CharacterStore, PlayerCharacter};
use crate::combat::rng::CombatRng;
use crate::errors::{CombatResult, DataError};
use schema::{AbilityKind, AiBehavior, DamageType, Faction, Line, Stat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a participant within a scene. Players use their character id,
/// enemies a generated `enemy_<n>_<template>` id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CombatantId(String);

impl CombatantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn enemy(index: usize, template_key: &str) -> Self {
        Self(format!("enemy_{}_{}", index, template_key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CombatantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A damage roll range and the type of damage it deals.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageProfile {
    pub min: u32,
    pub max: u32,
    pub damage_type: DamageType,
}

impl DamageProfile {
    pub fn new(min: u32, max: u32, damage_type: DamageType) -> Self {
        Self {
            min,
            max,
            damage_type,
        }
    }

    /// Bare-handed strike for characters with nothing in the main hand.
    pub fn unarmed() -> Self {
        Self::new(1, 2, DamageType::Bludgeoning)
    }
}

/// Origin-specific data a combatant carries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum CombatantKind {
    Player {
        level: u32,
    },
    Enemy {
        template: String,
        behavior: AiBehavior,
        hp_range: (u32, u32),
        xp_range: (u32, u32),
    },
}

/// Everything the engine needs to know about one participant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub faction: Faction,
    pub kind: CombatantKind,
    pub max_hp: u32,
    pub armor: i32,
    pub speed: i32,
    pub to_hit_bonus: i32,
    pub weapon: DamageProfile,
    pub max_stamina: u32,
    pub action_skills: Vec<AbilityKind>,
    pub side_skills: Vec<AbilityKind>,
    pub resistances: Vec<DamageType>,
    pub formation: Line,
}

impl Combatant {
    pub fn is_player(&self) -> bool {
        matches!(self.kind, CombatantKind::Player { .. })
    }

    pub fn behavior(&self) -> Option<AiBehavior> {
        match self.kind {
            CombatantKind::Enemy { behavior, .. } => Some(behavior),
            CombatantKind::Player { .. } => None,
        }
    }

    pub fn knows(&self, ability: AbilityKind) -> bool {
        self.action_skills.contains(&ability) || self.side_skills.contains(&ability)
    }
}

/// A freshly resolved combatant together with the hit points and stamina it
/// enters the scene with.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub combatant: Combatant,
    pub hp: u32,
    pub stamina: u32,
}

/// What to resolve: a stored player character or an enemy template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    Player(String),
    Enemy { template: String, index: usize },
}

/// Resolves participants into combatants. Reads only; never writes to the
/// character store.
pub struct CombatantRegistry<'a> {
    catalog: &'a Catalog,
    characters: &'a dyn CharacterStore,
}

impl<'a> CombatantRegistry<'a> {
    pub fn new(catalog: &'a Catalog, characters: &'a dyn CharacterStore) -> Self {
        Self {
            catalog,
            characters,
        }
    }

    pub fn resolve(&self, participant: &Participant, rng: &mut CombatRng) -> CombatResult<Resolved> {
        match participant {
            Participant::Player(id) => self.resolve_player(id),
            Participant::Enemy { template, index } => self.spawn_enemy(template, *index, rng),
        }
    }

    pub fn resolve_player(&self, id: &str) -> CombatResult<Resolved> {
        let character = self
            .characters
            .get(id)?
            .ok_or_else(|| DataError::CharacterNotFound(id.to_string()))?;
        Ok(self.from_character(&character)?)
    }

    /// Derive combat attributes from a stored character: the equipped weapon
    /// decides damage and which stat feeds the to-hit bonus.
    pub fn from_character(&self, character: &PlayerCharacter) -> Result<Resolved, DataError> {
        let (weapon, stat) = match &character.mainhand {
            Some(name) => {
                let data = self.catalog.weapon(name)?;
                (
                    DamageProfile::new(data.damage_min, data.damage_max, data.damage_type),
                    data.stat,
                )
            }
            None => (DamageProfile::unarmed(), Stat::Strength),
        };

        let action_skills = parse_skills(&character.action_skills)?;
        let side_skills = parse_skills(&character.sideaction_skills)?;

        let combatant = Combatant {
            id: CombatantId::new(character.id.clone()),
            name: character.name.clone(),
            faction: Faction::Friendly,
            kind: CombatantKind::Player {
                level: character.level,
            },
            max_hp: character.max_hp,
            armor: character.armor,
            speed: character.speed,
            to_hit_bonus: stat_bonus(character.stat(stat)),
            weapon,
            max_stamina: character.max_stamina,
            action_skills,
            side_skills,
            resistances: Vec::new(),
            formation: character.formation,
        };

        Ok(Resolved {
            hp: character.current_hp.min(character.max_hp),
            stamina: character.current_stamina.min(character.max_stamina),
            combatant,
        })
    }

    /// Instantiate a fresh enemy from its template, sampling hit points from the
    /// template range.
    pub fn spawn_enemy(
        &self,
        template_key: &str,
        index: usize,
        rng: &mut CombatRng,
    ) -> CombatResult<Resolved> {
        let template = self.catalog.enemy(template_key)?;
        let hp = rng.roll_u32(template.hp_min, template.hp_max, "enemy hit points");

        let combatant = Combatant {
            id: CombatantId::enemy(index, &template_key.to_lowercase()),
            name: template.name.clone(),
            faction: Faction::Enemy,
            kind: CombatantKind::Enemy {
                template: template_key.to_lowercase(),
                behavior: template.ai,
                hp_range: (template.hp_min, template.hp_max),
                xp_range: (template.xp_min, template.xp_max),
            },
            max_hp: hp,
            armor: template.armor,
            speed: template.speed,
            to_hit_bonus: template.attack_bonus,
            weapon: DamageProfile::new(template.damage_min, template.damage_max, template.damage_type),
            max_stamina: template.stamina,
            action_skills: template.action_skills.clone(),
            side_skills: template.side_skills.clone(),
            resistances: template.resistances.clone(),
            formation: template.formation,
        };

        tracing::debug!(id = %combatant.id, hp, "spawned enemy from template `{}`", template_key);
        Ok(Resolved {
            combatant,
            hp,
            stamina: template.stamina,
        })
    }
}

fn parse_skills(names: &[String]) -> Result<Vec<AbilityKind>, DataError> {
    names
        .iter()
        .map(|name| {
            AbilityKind::from_name(name)
                .ok_or_else(|| DataError::MalformedData(format!("unknown skill `{}`", name)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::InMemoryCharacterStore;
    use crate::combat::tests::common::{sample_catalog, sample_character};
    use crate::errors::CombatError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_player_bonus_comes_from_weapon_stat() {
        let catalog = sample_catalog();
        let mut character = sample_character("7", "Vessa");
        character.mainhand = Some("Iron Dagger".to_string());
        character.stats.insert(Stat::Dexterity, 9);
        let store = InMemoryCharacterStore::with_characters([character]);

        let registry = CombatantRegistry::new(&catalog, &store);
        let resolved = registry.resolve_player("7").expect("resolves");

        assert_eq!(resolved.combatant.to_hit_bonus, 4);
        assert_eq!(resolved.combatant.weapon.damage_type, DamageType::Piercing);
        assert_eq!(resolved.combatant.faction, Faction::Friendly);
    }

    #[test]
    fn test_unarmed_player_uses_strength() {
        let catalog = sample_catalog();
        let mut character = sample_character("7", "Vessa");
        character.mainhand = None;
        character.stats.insert(Stat::Strength, 5);
        let store = InMemoryCharacterStore::with_characters([character]);

        let resolved = CombatantRegistry::new(&catalog, &store)
            .resolve_player("7")
            .expect("resolves");
        assert_eq!(resolved.combatant.weapon, DamageProfile::unarmed());
        assert_eq!(resolved.combatant.to_hit_bonus, 2);
    }

    #[test]
    fn test_unknown_weapon_is_rejected() {
        let catalog = sample_catalog();
        let mut character = sample_character("7", "Vessa");
        character.mainhand = Some("Glass Cannon".to_string());
        let store = InMemoryCharacterStore::with_characters([character]);

        let err = CombatantRegistry::new(&catalog, &store)
            .resolve_player("7")
            .unwrap_err();
        assert!(matches!(err, CombatError::Data(DataError::WeaponNotFound(_))));
    }

    #[test]
    fn test_missing_player_is_not_found() {
        let catalog = sample_catalog();
        let store = InMemoryCharacterStore::new();
        let err = CombatantRegistry::new(&catalog, &store)
            .resolve(&Participant::Player("404".to_string()), &mut CombatRng::new_for_test(vec![]))
            .unwrap_err();
        assert!(matches!(err, CombatError::Data(DataError::CharacterNotFound(_))));
    }

    #[test]
    fn test_enemy_hp_sampled_within_template_range() {
        let catalog = sample_catalog();
        let store = InMemoryCharacterStore::new();
        let registry = CombatantRegistry::new(&catalog, &store);

        let mut rng = CombatRng::new_for_test(vec![99]);
        let resolved = registry.spawn_enemy("goblin", 0, &mut rng).expect("spawns");

        let template = catalog.enemy("goblin").unwrap();
        assert_eq!(resolved.hp, template.hp_max);
        assert_eq!(resolved.combatant.id, CombatantId::new("enemy_0_goblin"));
        assert_eq!(
            resolved.combatant.kind,
            CombatantKind::Enemy {
                template: "goblin".to_string(),
                behavior: AiBehavior::Melee,
                hp_range: (template.hp_min, template.hp_max),
                xp_range: (template.xp_min, template.xp_max),
            }
        );
    }
}
