//! Initiative and the turn pointer.

use crate::combat::combatant::CombatantId;
use crate::combat::rng::CombatRng;
use crate::combat::state::{ActionsUsed, CombatEvent, EventBus, Scene};
use std::cmp::Reverse;

/// Roll initiative for everyone on the field and build the turn order.
///
/// Initiative is speed plus 1d10. The order is descending; ties keep
/// registration order. The first combatant's turn begins immediately.
pub fn initialize(scene: &mut Scene, rng: &mut CombatRng, bus: &mut EventBus) {
    let mut rolled = Vec::new();
    for id in scene.roster.clone() {
        if scene.position_of(&id).is_none() {
            continue;
        }
        let roll = rng.roll(1, 10, "initiative") as i32;
        if let Some(state) = scene.get_mut(&id) {
            let initiative = state.combatant.speed + roll;
            state.initiative = Some(initiative);
            state.actions = Some(ActionsUsed::default());
            tracing::debug!(id = %id, initiative, "rolled initiative");
            rolled.push((id, initiative));
        }
    }

    // sort_by_key is stable, so equal initiative keeps roster order
    rolled.sort_by_key(|(_, initiative)| Reverse(*initiative));
    scene.turn_order = rolled.into_iter().map(|(id, _)| id).collect();
    scene.turn_index = 0;
    scene.round = 1;
    begin_turn(scene, bus);
}

/// Start the active combatant's turn: both action slots become available again.
pub fn begin_turn(scene: &mut Scene, bus: &mut EventBus) {
    let round = scene.round;
    let Some(id) = scene.active_id().cloned() else {
        return;
    };
    if let Some(state) = scene.get_mut(&id) {
        state.actions = Some(ActionsUsed::default());
    }
    bus.push(CombatEvent::TurnStarted { actor: id, round });
}

/// Move the turn pointer to the next combatant and begin its turn.
///
/// `actor_removed` is set when the combatant whose turn just ended was taken
/// out of the order during that turn; the pointer then already rests on its
/// successor.
pub fn advance(scene: &mut Scene, bus: &mut EventBus, actor_removed: bool) -> Option<CombatantId> {
    if scene.turn_order.is_empty() {
        scene.turn_index = 0;
        return None;
    }

    let next = if actor_removed {
        scene.turn_index
    } else {
        scene.turn_index + 1
    };
    if next >= scene.turn_order.len() {
        scene.turn_index = 0;
        scene.round += 1;
    } else {
        scene.turn_index = next;
    }

    begin_turn(scene, bus);
    scene.active_id().cloned()
}

/// Drop a combatant from the turn order, keeping the pointer on the same
/// active combatant. When the active combatant itself is removed the pointer
/// is left on its successor.
pub fn remove_from_order(scene: &mut Scene, id: &CombatantId) {
    let Some(position) = scene.turn_order.iter().position(|entry| entry == id) else {
        return;
    };
    scene.turn_order.remove(position);
    if position < scene.turn_index {
        scene.turn_index -= 1;
    }
}
