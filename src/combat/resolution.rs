//! Death, wipe detection, and rewards.

use crate::character::CharacterStore;
use crate::combat::combatant::{CombatantId, CombatantKind};
use crate::combat::rng::CombatRng;
use crate::combat::state::{CombatEvent, EventBus, Scene, Termination};
use crate::combat::turns;
use crate::errors::PersistenceResult;
use crate::store::{BackupStore, GraveyardLog, GraveyardRecord};
use schema::{Faction, Line};

/// Who died in a sweep and whether the scene is over.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sweep {
    pub fallen: Vec<CombatantId>,
    pub termination: Option<Termination>,
}

impl Sweep {
    pub fn merge(&mut self, other: Sweep) {
        self.fallen.extend(other.fallen);
        if self.termination.is_none() {
            self.termination = other.termination;
        }
    }

    pub fn is_over(&self) -> bool {
        self.termination.is_some()
    }
}

/// Move everyone at zero hit points off the field and report whether a
/// faction has been wiped out. Called after every hit point change.
pub fn check_termination(scene: &mut Scene, bus: &mut EventBus) -> Sweep {
    let mut sweep = Sweep::default();

    let dead: Vec<(CombatantId, Faction, Line)> = scene
        .combatants
        .iter()
        .filter(|(_, state)| state.hp == 0)
        .filter_map(|(id, _)| {
            scene
                .position_of(id)
                .map(|(faction, line)| (id.clone(), faction, line))
        })
        .collect();

    for (id, faction, line) in dead {
        scene.line_mut(faction, line).retain(|entry| entry != &id);
        scene.graveyard_mut(faction).push(id.clone());
        turns::remove_from_order(scene, &id);
        if let Some(state) = scene.get_mut(&id) {
            state.initiative = None;
            state.actions = None;
        }
        tracing::info!(scene = %scene.id, id = %id, "{} has fallen", scene.name_of(&id));
        bus.push(CombatEvent::CombatantDied {
            id: id.clone(),
            faction,
        });
        sweep.fallen.push(id);
    }

    sweep.termination = if scene.is_wiped(Faction::Friendly) {
        Some(Termination::FriendlyWipe)
    } else if scene.is_wiped(Faction::Enemy) {
        Some(Termination::EnemyWipe)
    } else {
        None
    };
    if sweep.is_over() && scene.turn_index >= scene.turn_order.len() {
        scene.turn_index = 0;
    }
    sweep
}

/// Experience earned by a victorious party.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewards {
    pub total_xp: u64,
    pub per_survivor: u64,
    pub recipients: Vec<CombatantId>,
}

/// Roll each dead enemy's experience once and split the sum evenly, rounding
/// down, among the surviving players.
pub fn compute_rewards(scene: &Scene, rng: &mut CombatRng) -> Rewards {
    let total_xp: u64 = scene
        .graveyard_enemy
        .iter()
        .filter_map(|id| scene.get(id))
        .filter_map(|state| match &state.combatant.kind {
            CombatantKind::Enemy { xp_range, .. } => Some(*xp_range),
            CombatantKind::Player { .. } => None,
        })
        .map(|(min, max)| u64::from(rng.roll_u32(min, max, "experience reward")))
        .sum();

    let recipients: Vec<CombatantId> = surviving_players(scene);
    let per_survivor = match recipients.len() as u64 {
        0 => 0,
        n => total_xp / n,
    };
    Rewards {
        total_xp,
        per_survivor,
        recipients,
    }
}

/// Players still standing in a friendly line.
pub fn surviving_players(scene: &Scene) -> Vec<CombatantId> {
    scene
        .members(Faction::Friendly)
        .into_iter()
        .filter(|id| scene.get(id).is_some_and(|state| state.combatant.is_player()))
        .collect()
}

/// Permanent death for fallen player characters: snapshot the character to
/// the backup store, append a graveyard record, then remove it from the
/// character store. Enemies need no bookkeeping.
pub fn bury_fallen(
    scene: &Scene,
    fallen: &[CombatantId],
    characters: &dyn CharacterStore,
    graveyard: &dyn GraveyardLog,
    backups: &dyn BackupStore,
) -> PersistenceResult<()> {
    for id in fallen {
        let Some(state) = scene.get(id) else {
            continue;
        };
        let CombatantKind::Player { level } = state.combatant.kind else {
            continue;
        };

        let character = characters.get(id.as_str())?;
        let class = match &character {
            Some(character) => {
                let mut last_known = character.clone();
                last_known.current_hp = 0;
                last_known.current_stamina = state.stamina;
                backups.save(&last_known)?;
                character.class.clone()
            }
            None => {
                tracing::warn!(id = %id, "fallen character is missing from the store; no backup taken");
                String::new()
            }
        };

        graveyard.append(GraveyardRecord {
            character_id: id.to_string(),
            name: state.combatant.name.clone(),
            level,
            class,
            killed_by: state.last_hit_by.clone(),
            scene: scene.id.clone(),
            round: scene.round,
        })?;
        characters.remove(id.as_str())?;
        tracing::info!(id = %id, "{} was laid to rest", state.combatant.name);
    }
    Ok(())
}

/// Write surviving players' hit points and stamina back to the character
/// store, adding `xp_each` experience to every survivor.
pub fn persist_survivors(
    scene: &Scene,
    characters: &dyn CharacterStore,
    xp_each: u64,
) -> PersistenceResult<()> {
    for id in surviving_players(scene) {
        let Some(state) = scene.get(&id) else {
            continue;
        };
        let Some(mut character) = characters.get(id.as_str())? else {
            tracing::warn!(id = %id, "surviving character is missing from the store");
            continue;
        };
        character.current_hp = state.hp;
        character.current_stamina = state.stamina;
        character.experience += xp_each;
        characters.put(character)?;
    }
    Ok(())
}
