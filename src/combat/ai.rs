//! Decision making for combatants no player controls.

use crate::combat::abilities;
use crate::combat::actions::{self, ActionRequest};
use crate::combat::combatant::CombatantId;
use crate::combat::resolution::Sweep;
use crate::combat::rng::CombatRng;
use crate::combat::state::{CombatEvent, EventBus, Scene};
use schema::{AbilityKind, ActionSlot, AiBehavior, Faction, Line};
use std::collections::HashMap;

/// A strategy for one behavior tag. Implementors decide who to aim at; the
/// action choice itself is shared.
pub trait Behavior: Send + Sync {
    /// Candidate targets for `actor`, in preference order of lines.
    fn target_pool(&self, actor: &CombatantId, scene: &Scene) -> Vec<CombatantId>;
}

/// Strikes whatever stands in front: the opposing frontline, or the backline
/// once the front has fallen.
pub struct Melee;

impl Behavior for Melee {
    fn target_pool(&self, actor: &CombatantId, scene: &Scene) -> Vec<CombatantId> {
        match opposing(actor, scene) {
            Some(faction) => scene.exposed_line(faction),
            None => Vec::new(),
        }
    }
}

/// Shoots over the front: prefers the opposing backline.
pub struct Ranged;

impl Behavior for Ranged {
    fn target_pool(&self, actor: &CombatantId, scene: &Scene) -> Vec<CombatantId> {
        let Some(faction) = opposing(actor, scene) else {
            return Vec::new();
        };
        let back = scene.line(faction, Line::Backline);
        if back.is_empty() {
            scene.line(faction, Line::Frontline).clone()
        } else {
            back.clone()
        }
    }
}

fn opposing(actor: &CombatantId, scene: &Scene) -> Option<Faction> {
    scene.get(actor).map(|state| state.combatant.faction.opponent())
}

/// The result of one AI-driven turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AiTurn {
    pub actor: CombatantId,
    pub target: Option<CombatantId>,
    pub sweep: Sweep,
    pub message: String,
}

/// Behavior tag to strategy table, built once at engine start.
pub struct AiRegistry {
    handlers: HashMap<AiBehavior, Box<dyn Behavior>>,
}

impl Default for AiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AiRegistry {
    pub fn new() -> Self {
        let mut handlers: HashMap<AiBehavior, Box<dyn Behavior>> = HashMap::new();
        handlers.insert(AiBehavior::Melee, Box::new(Melee));
        handlers.insert(AiBehavior::Ranged, Box::new(Ranged));
        Self { handlers }
    }

    pub fn handler(&self, behavior: AiBehavior) -> Option<&dyn Behavior> {
        self.handlers.get(&behavior).map(|handler| handler.as_ref())
    }

    /// Play out the whole turn of the active combatant if it is AI-controlled.
    /// Returns `None` when the active combatant is a player or the scene has
    /// nobody to act.
    pub fn act(&self, scene: &mut Scene, rng: &mut CombatRng, bus: &mut EventBus) -> Option<AiTurn> {
        let actor = scene.active_id().cloned()?;
        let behavior = scene.get(&actor)?.combatant.behavior()?;
        let handler = self.handler(behavior)?;
        let mut sweep = Sweep::default();

        let pool = handler.target_pool(&actor, scene);
        if pool.is_empty() {
            bus.push(CombatEvent::NoTargets { actor: actor.clone() });
            let ended = actions::end_turn(scene, rng, bus, &actor);
            return Some(AiTurn {
                message: format!("{} finds no one to fight.", scene.name_of(&actor)),
                actor,
                target: None,
                sweep: ended.sweep,
            });
        }
        let mut target = pool[rng.pick(pool.len(), "ai target")].clone();
        let target_name = scene.name_of(&target);

        // main: a random ready ability, else a basic attack
        let main_pool: Vec<AbilityKind> =
            actions::usable_abilities(scene, &actor, ActionSlot::Main).collect();
        let main = match main_pool.len() {
            0 => ActionRequest::attack(actor.clone(), target.clone()),
            n => {
                let ability = main_pool[rng.pick(n, "ai main ability")];
                let aimed = abilities::profile(ability).needs_target().then(|| target.clone());
                ActionRequest::ability(actor.clone(), &ability.to_string(), aimed)
            }
        };
        tracing::debug!(actor = %actor, target = %target, action = ?main.kind, "ai main action");
        sweep.merge(self.perform(scene, rng, bus, &main, &actor, &target));

        // side: a random ready ability, else skipped
        if !sweep.is_over() && still_acting(scene, &actor) {
            let side_pool: Vec<AbilityKind> =
                actions::usable_abilities(scene, &actor, ActionSlot::Side).collect();
            if side_pool.is_empty() {
                bus.push(CombatEvent::SideActionSkipped { actor: actor.clone() });
            } else {
                let ability = side_pool[rng.pick(side_pool.len(), "ai side ability")];
                let profile = abilities::profile(ability);
                if profile.needs_target() && !scene.is_alive(&target) {
                    let fresh = handler.target_pool(&actor, scene);
                    if !fresh.is_empty() {
                        target = fresh[rng.pick(fresh.len(), "ai retarget")].clone();
                    }
                }
                let aimed = profile.needs_target().then(|| target.clone());
                let side = ActionRequest::ability(actor.clone(), &ability.to_string(), aimed);
                tracing::debug!(actor = %actor, action = ?side.kind, "ai side action");
                sweep.merge(self.perform(scene, rng, bus, &side, &actor, &target));
            }
        }

        if !sweep.is_over() && still_acting(scene, &actor) {
            sweep.merge(actions::end_turn(scene, rng, bus, &actor).sweep);
        }

        Some(AiTurn {
            message: format!("{} acted against {}.", scene.name_of(&actor), target_name),
            actor,
            target: Some(target),
            sweep,
        })
    }

    fn perform(
        &self,
        scene: &mut Scene,
        rng: &mut CombatRng,
        bus: &mut EventBus,
        request: &ActionRequest,
        actor: &CombatantId,
        target: &CombatantId,
    ) -> Sweep {
        match actions::resolve(scene, rng, bus, request) {
            Ok(executed) => executed.sweep,
            Err(rejection) => {
                tracing::warn!(actor = %actor, target = %target, %rejection, "ai action rejected");
                Sweep::default()
            }
        }
    }
}

/// The actor still holds the turn it started.
fn still_acting(scene: &Scene, actor: &CombatantId) -> bool {
    scene.active_id() == Some(actor)
}
