//! Validation and execution of a combatant's declared action.

use crate::combat::abilities::{self, AbilityEffect, AbilityProfile, Targeting};
use crate::combat::combatant::{CombatantId, DamageProfile};
use crate::combat::conditions::{self, DAZED_PENALTY};
use crate::combat::resolution::{self, Sweep};
use crate::combat::rng::CombatRng;
use crate::combat::state::{CombatEvent, EventBus, Scene};
use crate::combat::turns;
use crate::errors::ActionRejection;
use schema::{AbilityKind, ActionSlot, ConditionKind, Faction};
use serde::{Deserialize, Serialize};

/// The kinds of action a combatant can declare on its turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Basic weapon strike against one target.
    Attack,
    /// Step between the frontline and backline.
    Move,
    /// A named ability, looked up by normalized name.
    Ability { name: String },
    /// Give up whatever remains of the turn.
    EndTurn,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub actor: CombatantId,
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default)]
    pub target: Option<CombatantId>,
}

impl ActionRequest {
    pub fn attack(actor: impl Into<CombatantId>, target: impl Into<CombatantId>) -> Self {
        Self {
            actor: actor.into(),
            kind: ActionKind::Attack,
            target: Some(target.into()),
        }
    }

    pub fn movement(actor: impl Into<CombatantId>) -> Self {
        Self {
            actor: actor.into(),
            kind: ActionKind::Move,
            target: None,
        }
    }

    pub fn ability(actor: impl Into<CombatantId>, name: &str, target: Option<CombatantId>) -> Self {
        Self {
            actor: actor.into(),
            kind: ActionKind::Ability {
                name: name.to_string(),
            },
            target,
        }
    }

    pub fn end_turn(actor: impl Into<CombatantId>) -> Self {
        Self {
            actor: actor.into(),
            kind: ActionKind::EndTurn,
            target: None,
        }
    }
}

/// An action that passed every precondition.
#[derive(Debug, Clone, PartialEq)]
enum Validated {
    Attack { target: CombatantId },
    Move,
    Ability { profile: AbilityProfile, target: Option<CombatantId> },
    EndTurn,
}

/// What happened when an action was carried out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Executed {
    pub sweep: Sweep,
    pub turn_ended: bool,
}

/// Check every precondition in order without touching the scene.
///
/// 1. the scene is still running and it is the actor's turn
/// 2. the action slot is unused
/// 3. for abilities: not on cooldown, enough stamina
/// 4. for targeted actions: the target exists and is alive
fn validate(scene: &Scene, request: &ActionRequest) -> Result<Validated, ActionRejection> {
    if scene.turn_order.is_empty()
        || scene.is_wiped(Faction::Friendly)
        || scene.is_wiped(Faction::Enemy)
    {
        return Err(ActionRejection::CombatOver);
    }
    let actor = match scene.active() {
        Some(state) if state.combatant.id == request.actor => state,
        _ => {
            return Err(ActionRejection::NotYourTurn {
                actor: request.actor.clone(),
            })
        }
    };
    let used = actor.actions();

    match &request.kind {
        ActionKind::EndTurn => Ok(Validated::EndTurn),
        ActionKind::Move => {
            if used.main {
                return Err(ActionRejection::SlotAlreadyUsed(ActionSlot::Main));
            }
            Ok(Validated::Move)
        }
        ActionKind::Attack => {
            if used.main {
                return Err(ActionRejection::SlotAlreadyUsed(ActionSlot::Main));
            }
            let target = validate_target(scene, request.target.as_ref())?;
            Ok(Validated::Attack { target })
        }
        ActionKind::Ability { name } => {
            let kind = AbilityKind::from_name(name)
                .ok_or_else(|| ActionRejection::UnknownAbility(name.clone()))?;
            if !actor.combatant.knows(kind) {
                return Err(ActionRejection::AbilityNotKnown(kind));
            }
            let profile = abilities::profile(kind);
            let slot_used = match profile.slot {
                ActionSlot::Main => used.main,
                ActionSlot::Side => used.side,
            };
            if slot_used {
                return Err(ActionRejection::SlotAlreadyUsed(profile.slot));
            }
            if let Some(turns) = actor.cooldown(kind) {
                return Err(ActionRejection::OnCooldown {
                    ability: kind,
                    turns,
                });
            }
            if actor.stamina < profile.stamina_cost {
                return Err(ActionRejection::InsufficientStamina {
                    ability: kind,
                    needed: profile.stamina_cost,
                    available: actor.stamina,
                });
            }
            let target = if profile.needs_target() {
                Some(validate_target(scene, request.target.as_ref())?)
            } else {
                None
            };
            Ok(Validated::Ability { profile, target })
        }
    }
}

fn validate_target(scene: &Scene, target: Option<&CombatantId>) -> Result<CombatantId, ActionRejection> {
    let target = target.ok_or(ActionRejection::MissingTarget)?;
    if scene.get(target).is_none() {
        return Err(ActionRejection::TargetNotFound(target.clone()));
    }
    if !scene.is_alive(target) {
        return Err(ActionRejection::TargetDead(target.clone()));
    }
    Ok(target.clone())
}

/// Validate and carry out `request`. A rejection leaves the scene exactly as
/// it was.
pub fn resolve(
    scene: &mut Scene,
    rng: &mut CombatRng,
    bus: &mut EventBus,
    request: &ActionRequest,
) -> Result<Executed, ActionRejection> {
    let validated = validate(scene, request)?;
    let actor = request.actor.clone();
    let mut executed = Executed::default();

    match validated {
        Validated::EndTurn => {
            return Ok(end_turn(scene, rng, bus, &actor));
        }
        Validated::Move => {
            if let Some((faction, line)) = scene.position_of(&actor) {
                scene.line_mut(faction, line).retain(|id| id != &actor);
                scene.line_mut(faction, line.other()).push(actor.clone());
                bus.push(CombatEvent::Moved {
                    actor: actor.clone(),
                    to: line.other(),
                });
            }
            mark_slot(scene, &actor, ActionSlot::Main, None);
        }
        Validated::Attack { target } => {
            let weapon = weapon_of(scene, &actor);
            strike(scene, rng, bus, &actor, &target, None, weapon);
            mark_slot(scene, &actor, ActionSlot::Main, None);
            executed.sweep = resolution::check_termination(scene, bus);
        }
        Validated::Ability { profile, target } => {
            executed.sweep = use_ability(scene, rng, bus, &actor, profile, target);
        }
    }
    tracing::debug!(scene = %scene.id, actor = %actor, action = ?request.kind, "action resolved");

    if executed.sweep.is_over() {
        return Ok(executed);
    }
    if !has_remaining_action(scene, &actor) {
        let ended = end_turn(scene, rng, bus, &actor);
        executed.sweep.merge(ended.sweep);
        executed.turn_ended = true;
    }
    Ok(executed)
}

fn use_ability(
    scene: &mut Scene,
    rng: &mut CombatRng,
    bus: &mut EventBus,
    actor: &CombatantId,
    profile: AbilityProfile,
    target: Option<CombatantId>,
) -> Sweep {
    bus.push(CombatEvent::AbilityUsed {
        actor: actor.clone(),
        ability: profile.kind,
    });
    if let Some(state) = scene.get_mut(actor) {
        state.stamina -= profile.stamina_cost.min(state.stamina);
        state.cooldowns.insert(profile.kind, profile.cooldown);
    }
    bus.push(CombatEvent::CooldownStarted {
        actor: actor.clone(),
        ability: profile.kind,
        turns: profile.cooldown,
    });
    mark_slot(scene, actor, profile.slot, Some(profile.kind));

    let mut sweep = Sweep::default();
    match (profile.effect, profile.targeting) {
        (AbilityEffect::Heal { min, max }, _) => {
            let amount = rng.roll_u32(min, max, "healing roll");
            conditions::heal(scene, actor, amount, bus);
        }
        (AbilityEffect::Strike { damage, condition }, Targeting::OpposingLine) => {
            let Some(faction) = scene.get(actor).map(|state| state.combatant.faction) else {
                return sweep;
            };
            let targets = scene.exposed_line(faction.opponent());
            if targets.is_empty() {
                bus.push(CombatEvent::NoTargets { actor: actor.clone() });
            }
            for target in targets {
                // a target can drop out while the line is resolved; the rest still land
                if !scene.is_alive(&target) {
                    tracing::warn!(actor = %actor, target = %target, "cleave target lost mid-swing");
                    bus.push(CombatEvent::TargetLost {
                        actor: actor.clone(),
                        target,
                    });
                    continue;
                }
                let profile_damage = damage.unwrap_or_else(|| weapon_of(scene, actor));
                if strike(scene, rng, bus, actor, &target, Some(profile.kind), profile_damage) {
                    if let Some((kind, turns)) = condition {
                        conditions::apply_condition(scene, &target, kind, turns, bus);
                    }
                }
                sweep.merge(resolution::check_termination(scene, bus));
                if sweep.is_over() {
                    break;
                }
            }
            return sweep;
        }
        (AbilityEffect::Strike { damage, condition }, _) => {
            let target = target.unwrap_or_else(|| actor.clone());
            let profile_damage = damage.unwrap_or_else(|| weapon_of(scene, actor));
            if strike(scene, rng, bus, actor, &target, Some(profile.kind), profile_damage)
                && scene.get(&target).is_some_and(|state| state.hp > 0)
            {
                if let Some((kind, turns)) = condition {
                    conditions::apply_condition(scene, &target, kind, turns, bus);
                }
            }
        }
    }
    sweep.merge(resolution::check_termination(scene, bus));
    sweep
}

fn weapon_of(scene: &Scene, actor: &CombatantId) -> DamageProfile {
    scene
        .get(actor)
        .map(|state| state.combatant.weapon)
        .unwrap_or_else(DamageProfile::unarmed)
}

/// Roll to hit and, on a hit, roll and apply damage. Returns whether it hit.
///
/// To-hit is 1d10 plus the attacker's bonus, less the Dazed penalty; the
/// attack lands when the total meets or beats the target's armor.
pub fn strike(
    scene: &mut Scene,
    rng: &mut CombatRng,
    bus: &mut EventBus,
    attacker: &CombatantId,
    target: &CombatantId,
    ability: Option<AbilityKind>,
    damage: DamageProfile,
) -> bool {
    let (bonus, attacker_name) = match scene.get(attacker) {
        Some(state) => {
            let penalty = if state.has_condition(ConditionKind::Dazed) {
                DAZED_PENALTY
            } else {
                0
            };
            (state.combatant.to_hit_bonus - penalty, state.combatant.name.clone())
        }
        None => return false,
    };
    let Some(armor) = scene.get(target).map(|state| state.combatant.armor) else {
        return false;
    };

    let roll = rng.roll(1, 10, "to-hit roll") as i32;
    let total = roll + bonus;
    let hit = total >= armor;
    bus.push(CombatEvent::AttackRolled {
        attacker: attacker.clone(),
        target: target.clone(),
        ability,
        roll,
        bonus,
        total,
        armor,
        hit,
    });

    if hit {
        let raw = rng.roll_u32(damage.min, damage.max, "damage roll");
        conditions::apply_damage(scene, target, raw, damage.damage_type, Some(&attacker_name), bus);
    }
    hit
}

fn mark_slot(scene: &mut Scene, actor: &CombatantId, slot: ActionSlot, ability: Option<AbilityKind>) {
    let Some(state) = scene.get_mut(actor) else {
        return;
    };
    let mut used = state.actions();
    match slot {
        ActionSlot::Main => used.main = true,
        ActionSlot::Side => used.side = true,
    }
    if let Some(ability) = ability {
        used.abilities.push(ability);
    }
    state.actions = Some(used);
}

/// Whether the actor can still do anything this turn: the main action, or a
/// side ability that is off cooldown and affordable.
pub fn has_remaining_action(scene: &Scene, actor: &CombatantId) -> bool {
    let Some(state) = scene.get(actor) else {
        return false;
    };
    if state.actions.is_none() {
        return false;
    }
    let used = state.actions();
    if !used.main {
        return true;
    }
    !used.side && usable_abilities(scene, actor, ActionSlot::Side).next().is_some()
}

/// Known abilities for `slot` that are off cooldown and affordable.
pub fn usable_abilities<'a>(
    scene: &'a Scene,
    actor: &CombatantId,
    slot: ActionSlot,
) -> impl Iterator<Item = AbilityKind> + 'a {
    let state = scene.get(actor);
    let skills: Vec<AbilityKind> = state
        .map(|state| match slot {
            ActionSlot::Main => state.combatant.action_skills.clone(),
            ActionSlot::Side => state.combatant.side_skills.clone(),
        })
        .unwrap_or_default();
    skills.into_iter().filter(move |kind| {
        let profile = abilities::profile(*kind);
        state.is_some_and(|state| {
            profile.slot == slot
                && state.cooldown(*kind).is_none()
                && state.stamina >= profile.stamina_cost
        })
    })
}

/// Close `actor`'s turn: tick its conditions and cooldowns,
/// sweep the dead, then hand the turn to the next combatant.
pub fn end_turn(scene: &mut Scene, rng: &mut CombatRng, bus: &mut EventBus, actor: &CombatantId) -> Executed {
    bus.push(CombatEvent::TurnEnded {
        actor: actor.clone(),
    });

    // fell during its own turn: nothing left to tick and the pointer already
    // rests on the successor
    if !scene.turn_order.contains(actor) {
        turns::advance(scene, bus, true);
        return Executed {
            sweep: Sweep::default(),
            turn_ended: true,
        };
    }

    conditions::tick_combatant(scene, actor, rng, bus);
    let sweep = resolution::check_termination(scene, bus);
    if !sweep.is_over() {
        let actor_removed = sweep.fallen.contains(actor);
        turns::advance(scene, bus, actor_removed);
    }
    Executed {
        sweep,
        turn_ended: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::tests::common::{friendly, goblin, scene_with};
    use pretty_assertions::assert_eq;
    use schema::Line;

    fn duel() -> Scene {
        scene_with(
            vec![friendly("1", "Aldric")
                .speed(9)
                .weapon(2, 6, schema::DamageType::Slashing)
                .skills(&[AbilityKind::Rend, AbilityKind::Cleave])
                .side_skills(&[AbilityKind::Bash, AbilityKind::SecondWind])
                .stamina(3)
                .build()],
            vec![goblin("g").build()],
        )
    }

    #[test]
    fn test_validation_order_is_turn_then_slot_then_target() {
        let mut scene = duel();
        let mut rng = CombatRng::new_for_test(vec![]);
        let mut bus = EventBus::new();

        let not_yours = resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::attack("g", "1"));
        assert_eq!(not_yours, Err(ActionRejection::NotYourTurn { actor: "g".into() }));

        let missing = resolve(
            &mut scene,
            &mut rng,
            &mut bus,
            &ActionRequest {
                actor: "1".into(),
                kind: ActionKind::Attack,
                target: None,
            },
        );
        assert_eq!(missing, Err(ActionRejection::MissingTarget));

        let unknown = resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::attack("1", "nobody"));
        assert_eq!(unknown, Err(ActionRejection::TargetNotFound("nobody".into())));
        assert!(bus.is_empty());
    }

    #[test]
    fn test_move_swaps_lines_and_spends_main() {
        let mut scene = duel();
        let mut rng = CombatRng::new_for_test(vec![]);
        let mut bus = EventBus::new();

        let executed = resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::movement("1")).unwrap();
        assert!(!executed.turn_ended, "side abilities are still usable");
        assert_eq!(scene.position_of(&"1".into()), Some((Faction::Friendly, Line::Backline)));

        let again = resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::movement("1"));
        assert_eq!(again, Err(ActionRejection::SlotAlreadyUsed(ActionSlot::Main)));
    }

    #[test]
    fn test_rend_bleeds_and_starts_cooldown() {
        let mut scene = duel();
        // to-hit 8 vs AC 8, rend damage 3
        let mut rng = CombatRng::new_for_test(vec![8, 3]);
        let mut bus = EventBus::new();

        resolve(
            &mut scene,
            &mut rng,
            &mut bus,
            &ActionRequest::ability("1", "rend", Some("g".into())),
        )
        .unwrap();

        let goblin = scene.get(&"g".into()).unwrap();
        assert_eq!(goblin.hp, 27);
        assert_eq!(goblin.conditions.get(&ConditionKind::Bleeding), Some(&2));
        assert_eq!(scene.get(&"1".into()).unwrap().cooldown(AbilityKind::Rend), Some(2));
    }

    #[test]
    fn test_ability_preconditions() {
        let mut scene = duel();
        let mut rng = CombatRng::new_for_test(vec![]);
        let mut bus = EventBus::new();

        assert_eq!(
            resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::ability("1", "fireball", None)),
            Err(ActionRejection::UnknownAbility("fireball".to_string()))
        );

        scene.get_mut(&"1".into()).unwrap().cooldowns.insert(AbilityKind::Rend, 1);
        assert_eq!(
            resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::ability("1", "Rend", Some("g".into()))),
            Err(ActionRejection::OnCooldown {
                ability: AbilityKind::Rend,
                turns: 1
            })
        );

        scene.get_mut(&"1".into()).unwrap().stamina = 1;
        assert_eq!(
            resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::ability("1", "cleave", None)),
            Err(ActionRejection::InsufficientStamina {
                ability: AbilityKind::Cleave,
                needed: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_cleave_hits_the_whole_exposed_line() {
        let mut scene = scene_with(
            vec![friendly("1", "Aldric")
                .speed(9)
                .weapon(4, 4, schema::DamageType::Slashing)
                .skills(&[AbilityKind::Cleave])
                .stamina(2)
                .build()],
            vec![
                goblin("g1").build(),
                goblin("g2").build(),
                goblin("archer").line(Line::Backline).build(),
            ],
        );
        // hit g1, miss g2, then the turn ends with no side skills left
        let mut rng = CombatRng::new_for_test(vec![10, 4, 1]);
        let mut bus = EventBus::new();

        let executed = resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::ability("1", "cleave", None)).unwrap();

        assert!(executed.turn_ended);
        assert_eq!(scene.get(&"g1".into()).unwrap().hp, 26);
        assert_eq!(scene.get(&"g2".into()).unwrap().hp, 30);
        assert_eq!(scene.get(&"archer".into()).unwrap().hp, 30);
        assert_eq!(scene.get(&"1".into()).unwrap().stamina, 0);
    }

    #[test]
    fn test_dazed_attacker_takes_penalty() {
        let mut scene = duel();
        scene
            .get_mut(&"1".into())
            .unwrap()
            .conditions
            .insert(ConditionKind::Dazed, 2);
        let mut rng = CombatRng::new_for_test(vec![9]);
        let mut bus = EventBus::new();

        resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::attack("1", "g")).unwrap();
        assert!(bus.events().contains(&CombatEvent::AttackRolled {
            attacker: "1".into(),
            target: "g".into(),
            ability: None,
            roll: 9,
            bonus: -2,
            total: 7,
            armor: 8,
            hit: false,
        }));
    }

    #[test]
    fn test_second_wind_heals_self() {
        let mut scene = duel();
        scene.get_mut(&"1".into()).unwrap().hp = 90;
        let mut rng = CombatRng::new_for_test(vec![4]);
        let mut bus = EventBus::new();

        resolve(&mut scene, &mut rng, &mut bus, &ActionRequest::ability("1", "Second Wind", None)).unwrap();
        let state = scene.get(&"1".into()).unwrap();
        assert_eq!(state.hp, 94);
        assert_eq!(state.stamina, 2);
        assert!(state.actions().side);
    }
}
