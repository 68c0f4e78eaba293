//! Timed conditions, cooldown countdown, and the damage pipeline every hit
//! passes through.

use crate::combat::combatant::CombatantId;
use crate::combat::rng::CombatRng;
use crate::combat::state::{CombatEvent, CombatantState, EventBus, Scene};
use schema::{ConditionKind, DamageType};

/// To-hit penalty while Dazed.
pub const DAZED_PENALTY: i32 = 2;

/// Extra slashing damage taken while Bleeding.
pub const BLEEDING_SLASH_BONUS: u32 = 1;

/// Adjust raw damage for the target's conditions and resistances.
///
/// Bleeding targets take +1 from slashing hits; a resisted damage type is
/// halved (rounding down, never below 1 for a non-zero hit).
pub fn modify_incoming(target: &CombatantState, raw: u32, damage_type: DamageType) -> u32 {
    let mut amount = raw;
    if damage_type == DamageType::Slashing && target.has_condition(ConditionKind::Bleeding) {
        amount += BLEEDING_SLASH_BONUS;
    }
    if amount > 0 && target.combatant.resistances.contains(&damage_type) {
        amount = (amount / 2).max(1);
    }
    amount
}

/// The single point where damage from any source is finalized and debited.
/// Hit points never drop below zero. Returns the damage after modifiers.
pub fn apply_damage(
    scene: &mut Scene,
    target: &CombatantId,
    raw: u32,
    damage_type: DamageType,
    source: Option<&str>,
    bus: &mut EventBus,
) -> u32 {
    let Some(state) = scene.get_mut(target) else {
        return 0;
    };
    let amount = modify_incoming(state, raw, damage_type);
    state.hp = state.hp.saturating_sub(amount);
    if let (Some(source), true) = (source, amount > 0) {
        state.last_hit_by = Some(source.to_string());
    }
    tracing::debug!(target = %target, amount, hp = state.hp, "damage applied");
    bus.push(CombatEvent::DamageDealt {
        target: target.clone(),
        amount,
        damage_type,
        remaining_hp: state.hp,
    });
    amount
}

/// Restore hit points, capped at the combatant's maximum. Returns the amount
/// actually restored.
pub fn heal(scene: &mut Scene, target: &CombatantId, amount: u32, bus: &mut EventBus) -> u32 {
    let Some(state) = scene.get_mut(target) else {
        return 0;
    };
    let before = state.hp;
    state.hp = (state.hp + amount).min(state.combatant.max_hp);
    let restored = state.hp - before;
    bus.push(CombatEvent::Healed {
        target: target.clone(),
        amount: restored,
        new_hp: state.hp,
    });
    restored
}

/// Attach a condition. Reapplying refreshes to the longer duration.
pub fn apply_condition(
    scene: &mut Scene,
    target: &CombatantId,
    condition: ConditionKind,
    turns: u8,
    bus: &mut EventBus,
) {
    let Some(state) = scene.get_mut(target) else {
        return;
    };
    let remaining = state.conditions.entry(condition).or_insert(0);
    *remaining = (*remaining).max(turns);
    bus.push(CombatEvent::ConditionApplied {
        target: target.clone(),
        condition,
        turns,
    });
}

/// End-of-turn pass for the active combatant.
pub fn tick(scene: &mut Scene, rng: &mut CombatRng, bus: &mut EventBus) {
    if let Some(id) = scene.active_id().cloned() {
        tick_combatant(scene, &id, rng, bus);
    }
}

/// Run each condition's effect on `id`, count conditions and cooldowns down
/// by one, and drop those that reach zero. Cooldowns started during the
/// current turn are left untouched.
pub fn tick_combatant(scene: &mut Scene, id: &CombatantId, rng: &mut CombatRng, bus: &mut EventBus) {
    let Some(state) = scene.get(id) else {
        return;
    };
    let conditions: Vec<ConditionKind> = state.conditions.keys().copied().collect();

    for condition in conditions {
        if scene.get(id).is_some_and(|state| state.hp == 0) {
            break;
        }
        match condition {
            ConditionKind::Bleeding => {
                let raw = rng.roll_u32(1, 2, "bleeding damage");
                apply_damage(scene, id, raw, DamageType::Bleed, None, bus);
            }
            ConditionKind::Dazed => {}
        }
    }

    let Some(state) = scene.get_mut(id) else {
        return;
    };

    let mut expired = Vec::new();
    for (condition, remaining) in state.conditions.iter_mut() {
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            expired.push(*condition);
        }
    }
    for condition in expired {
        state.conditions.remove(&condition);
        bus.push(CombatEvent::ConditionExpired {
            target: id.clone(),
            condition,
        });
    }

    let fresh = state.actions().abilities;
    let mut ready = Vec::new();
    for (ability, remaining) in state.cooldowns.iter_mut() {
        if fresh.contains(ability) {
            continue;
        }
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            ready.push(*ability);
        }
    }
    for ability in ready {
        state.cooldowns.remove(&ability);
        bus.push(CombatEvent::CooldownExpired {
            actor: id.clone(),
            ability,
        });
    }
}
