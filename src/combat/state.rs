use crate::combat::combatant::{Combatant, CombatantId, Resolved};
use schema::{AbilityKind, ConditionKind, DamageType, Faction, Line};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Identifier of one combat scene.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a scene reached its end.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every friendly combatant is dead.
    FriendlyWipe,
    /// Every enemy combatant is dead.
    EnemyWipe,
}

impl Termination {
    pub fn winner(self) -> Faction {
        match self {
            Termination::FriendlyWipe => Faction::Enemy,
            Termination::EnemyWipe => Faction::Friendly,
        }
    }
}

/// Which action slots a combatant has spent during its current turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionsUsed {
    pub main: bool,
    pub side: bool,
    /// Abilities used this turn. Their cooldowns do not tick at the end of it.
    #[serde(default)]
    pub abilities: Vec<AbilityKind>,
}

/// Per-combatant mutable state within a scene.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CombatantState {
    pub combatant: Combatant,
    pub hp: u32,
    pub stamina: u32,
    /// Rolled initiative. Cleared when the combatant dies.
    pub initiative: Option<i32>,
    /// Action slots for the current turn. Cleared when the combatant dies.
    pub actions: Option<ActionsUsed>,
    pub conditions: BTreeMap<ConditionKind, u8>,
    pub cooldowns: BTreeMap<AbilityKind, u8>,
    /// Name of whoever last dealt damage to this combatant.
    pub last_hit_by: Option<String>,
}

impl CombatantState {
    pub fn new(resolved: Resolved) -> Self {
        Self {
            hp: resolved.hp,
            stamina: resolved.stamina,
            combatant: resolved.combatant,
            initiative: None,
            actions: None,
            conditions: BTreeMap::new(),
            cooldowns: BTreeMap::new(),
            last_hit_by: None,
        }
    }

    pub fn has_condition(&self, condition: ConditionKind) -> bool {
        self.conditions.contains_key(&condition)
    }

    pub fn cooldown(&self, ability: AbilityKind) -> Option<u8> {
        self.cooldowns.get(&ability).copied()
    }

    pub fn actions(&self) -> ActionsUsed {
        self.actions.clone().unwrap_or_default()
    }
}

/// A bounded, append-only log of human-readable lines. Only the most recent
/// `capacity` lines are retained.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push_back(line.into());
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// The last `n` lines, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One active combat encounter and all of its mutable state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub id: SceneId,
    pub round: u32,
    pub friendly_frontline: Vec<CombatantId>,
    pub friendly_backline: Vec<CombatantId>,
    pub enemy_frontline: Vec<CombatantId>,
    pub enemy_backline: Vec<CombatantId>,
    /// Registration order, used to break initiative ties.
    pub roster: Vec<CombatantId>,
    pub turn_order: Vec<CombatantId>,
    pub turn_index: usize,
    pub combatants: BTreeMap<CombatantId, CombatantState>,
    pub graveyard_friendly: Vec<CombatantId>,
    pub graveyard_enemy: Vec<CombatantId>,
    pub log: EventLog,
}

impl Scene {
    pub fn new(id: SceneId, log_capacity: usize) -> Self {
        Self {
            id,
            round: 1,
            friendly_frontline: Vec::new(),
            friendly_backline: Vec::new(),
            enemy_frontline: Vec::new(),
            enemy_backline: Vec::new(),
            roster: Vec::new(),
            turn_order: Vec::new(),
            turn_index: 0,
            combatants: BTreeMap::new(),
            graveyard_friendly: Vec::new(),
            graveyard_enemy: Vec::new(),
            log: EventLog::new(log_capacity),
        }
    }

    /// Register a combatant on the given line. Registration order is kept in
    /// `roster` for initiative tie-breaks.
    pub fn add_combatant(&mut self, resolved: Resolved, line: Line) -> CombatantId {
        let id = resolved.combatant.id.clone();
        let faction = resolved.combatant.faction;
        self.line_mut(faction, line).push(id.clone());
        self.roster.push(id.clone());
        self.combatants.insert(id.clone(), CombatantState::new(resolved));
        id
    }

    pub fn line(&self, faction: Faction, line: Line) -> &Vec<CombatantId> {
        match (faction, line) {
            (Faction::Friendly, Line::Frontline) => &self.friendly_frontline,
            (Faction::Friendly, Line::Backline) => &self.friendly_backline,
            (Faction::Enemy, Line::Frontline) => &self.enemy_frontline,
            (Faction::Enemy, Line::Backline) => &self.enemy_backline,
        }
    }

    pub fn line_mut(&mut self, faction: Faction, line: Line) -> &mut Vec<CombatantId> {
        match (faction, line) {
            (Faction::Friendly, Line::Frontline) => &mut self.friendly_frontline,
            (Faction::Friendly, Line::Backline) => &mut self.friendly_backline,
            (Faction::Enemy, Line::Frontline) => &mut self.enemy_frontline,
            (Faction::Enemy, Line::Backline) => &mut self.enemy_backline,
        }
    }

    pub fn graveyard_mut(&mut self, faction: Faction) -> &mut Vec<CombatantId> {
        match faction {
            Faction::Friendly => &mut self.graveyard_friendly,
            Faction::Enemy => &mut self.graveyard_enemy,
        }
    }

    /// The faction and line currently holding `id`, if it is on the field.
    pub fn position_of(&self, id: &CombatantId) -> Option<(Faction, Line)> {
        [Faction::Friendly, Faction::Enemy]
            .into_iter()
            .flat_map(|faction| [Line::Frontline, Line::Backline].map(|line| (faction, line)))
            .find(|(faction, line)| self.line(*faction, *line).contains(id))
    }

    /// Living members of a faction, frontline first.
    pub fn members(&self, faction: Faction) -> Vec<CombatantId> {
        self.line(faction, Line::Frontline)
            .iter()
            .chain(self.line(faction, Line::Backline))
            .cloned()
            .collect()
    }

    /// The line an attacker must strike: the opposing frontline if anyone is
    /// standing in it, otherwise the backline.
    pub fn exposed_line(&self, faction: Faction) -> Vec<CombatantId> {
        let front = self.line(faction, Line::Frontline);
        if front.is_empty() {
            self.line(faction, Line::Backline).clone()
        } else {
            front.clone()
        }
    }

    pub fn get(&self, id: &CombatantId) -> Option<&CombatantState> {
        self.combatants.get(id)
    }

    pub fn get_mut(&mut self, id: &CombatantId) -> Option<&mut CombatantState> {
        self.combatants.get_mut(id)
    }

    pub fn name_of(&self, id: &CombatantId) -> String {
        self.get(id)
            .map(|state| state.combatant.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn is_alive(&self, id: &CombatantId) -> bool {
        self.get(id).is_some_and(|state| state.hp > 0) && self.position_of(id).is_some()
    }

    pub fn active_id(&self) -> Option<&CombatantId> {
        self.turn_order.get(self.turn_index)
    }

    pub fn active(&self) -> Option<&CombatantState> {
        self.active_id().and_then(|id| self.get(id))
    }

    pub fn is_wiped(&self, faction: Faction) -> bool {
        self.line(faction, Line::Frontline).is_empty() && self.line(faction, Line::Backline).is_empty()
    }

    /// Structural invariants every persisted scene must satisfy.
    pub fn validate_invariants(&self) -> Result<(), String> {
        let mut placed = BTreeSet::new();
        for (faction, line) in [
            (Faction::Friendly, Line::Frontline),
            (Faction::Friendly, Line::Backline),
            (Faction::Enemy, Line::Frontline),
            (Faction::Enemy, Line::Backline),
        ] {
            for id in self.line(faction, line) {
                if !placed.insert(id.clone()) {
                    return Err(format!("{} stands in more than one line", id));
                }
                match self.get(id) {
                    Some(state) if state.combatant.faction == faction => {}
                    Some(_) => return Err(format!("{} stands in the wrong faction's line", id)),
                    None => return Err(format!("{} has no combatant record", id)),
                }
            }
        }

        for id in self.graveyard_friendly.iter().chain(&self.graveyard_enemy) {
            if placed.contains(id) {
                return Err(format!("{} is both in a line and in a graveyard", id));
            }
        }

        let ordered: BTreeSet<CombatantId> = self.turn_order.iter().cloned().collect();
        if ordered.len() != self.turn_order.len() {
            return Err("turn order contains duplicates".to_string());
        }
        if ordered != placed {
            return Err("turn order does not match the combatants on the field".to_string());
        }

        if !self.turn_order.is_empty() && self.turn_index >= self.turn_order.len() {
            return Err(format!("turn pointer {} is out of range", self.turn_index));
        }

        for (id, state) in &self.combatants {
            if state.hp > state.combatant.max_hp {
                return Err(format!("{} has more hit points than its maximum", id));
            }
            let on_field = placed.contains(id);
            if on_field != state.initiative.is_some() || on_field != state.actions.is_some() {
                return Err(format!("{} has initiative or action flags out of step", id));
            }
        }
        Ok(())
    }
}

/// Everything that can happen during combat. Events are collected per call
/// and rendered into the scene log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CombatEvent {
    CombatStarted {
        scene: SceneId,
    },
    TurnStarted {
        actor: CombatantId,
        round: u32,
    },
    TurnEnded {
        actor: CombatantId,
    },
    AttackRolled {
        attacker: CombatantId,
        target: CombatantId,
        ability: Option<AbilityKind>,
        roll: i32,
        bonus: i32,
        total: i32,
        armor: i32,
        hit: bool,
    },
    DamageDealt {
        target: CombatantId,
        amount: u32,
        damage_type: DamageType,
        remaining_hp: u32,
    },
    Healed {
        target: CombatantId,
        amount: u32,
        new_hp: u32,
    },
    Moved {
        actor: CombatantId,
        to: Line,
    },
    AbilityUsed {
        actor: CombatantId,
        ability: AbilityKind,
    },
    ConditionApplied {
        target: CombatantId,
        condition: ConditionKind,
        turns: u8,
    },
    ConditionExpired {
        target: CombatantId,
        condition: ConditionKind,
    },
    CooldownStarted {
        actor: CombatantId,
        ability: AbilityKind,
        turns: u8,
    },
    CooldownExpired {
        actor: CombatantId,
        ability: AbilityKind,
    },
    TargetLost {
        actor: CombatantId,
        target: CombatantId,
    },
    NoTargets {
        actor: CombatantId,
    },
    SideActionSkipped {
        actor: CombatantId,
    },
    CombatantDied {
        id: CombatantId,
        faction: Faction,
    },
    CombatEnded {
        termination: Termination,
        xp_each: u64,
    },
    CombatAborted,
}

impl CombatEvent {
    /// Formats the event into a human-readable string using scene context.
    /// Returns None for silent events that should not produce user-visible text.
    pub fn format(&self, scene: &Scene) -> Option<String> {
        match self {
            CombatEvent::CombatStarted { scene: id } => Some(format!("Combat {} begins!", id)),
            CombatEvent::TurnStarted { actor, round } => Some(format!(
                "Round {}: {}'s turn.",
                round,
                scene.name_of(actor)
            )),
            CombatEvent::TurnEnded { .. } => None,

            CombatEvent::AttackRolled {
                attacker,
                target,
                ability,
                roll,
                bonus,
                total,
                armor,
                hit,
            } => {
                let verb = match ability {
                    Some(ability) => format!("uses {} on", ability),
                    None => "attacks".to_string(),
                };
                Some(format!(
                    "{} {} {} ({}{:+}={} vs AC {}). {}",
                    scene.name_of(attacker),
                    verb,
                    scene.name_of(target),
                    roll,
                    bonus,
                    total,
                    armor,
                    if *hit { "Hit!" } else { "Miss!" }
                ))
            }
            CombatEvent::DamageDealt {
                target,
                amount,
                damage_type,
                remaining_hp,
            } => Some(format!(
                "{} takes {} {} damage ({} HP left).",
                scene.name_of(target),
                amount,
                damage_type,
                remaining_hp
            )),
            CombatEvent::Healed { target, amount, .. } => {
                Some(format!("{} recovers {} HP.", scene.name_of(target), amount))
            }
            CombatEvent::Moved { actor, to } => {
                Some(format!("{} moved to the {}.", scene.name_of(actor), to))
            }
            CombatEvent::AbilityUsed { actor, ability } => {
                Some(format!("{} uses {}!", scene.name_of(actor), ability))
            }
            CombatEvent::ConditionApplied {
                target, condition, ..
            } => Some(format!("{} is {}!", scene.name_of(target), condition)),
            CombatEvent::ConditionExpired { target, condition } => Some(format!(
                "{} is no longer {}.",
                scene.name_of(target),
                condition
            )),
            CombatEvent::CooldownStarted { .. } | CombatEvent::CooldownExpired { .. } => None,
            CombatEvent::TargetLost { actor, target } => Some(format!(
                "{} finds no one left where {} stood.",
                scene.name_of(actor),
                scene.name_of(target)
            )),
            CombatEvent::NoTargets { actor } => Some(format!(
                "{} looks around but finds no one to attack.",
                scene.name_of(actor)
            )),
            CombatEvent::SideActionSkipped { .. } => None,
            CombatEvent::CombatantDied { id, .. } => {
                Some(format!("{} has fallen!", scene.name_of(id)))
            }
            CombatEvent::CombatEnded {
                termination,
                xp_each,
            } => match termination {
                Termination::EnemyWipe => Some(format!("Combat ended! +{} XP", xp_each)),
                Termination::FriendlyWipe => Some("Your party has fallen…".to_string()),
            },
            CombatEvent::CombatAborted => Some("The combat was abandoned.".to_string()),
        }
    }
}

/// Event bus for collecting the events of one engine call.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    events: Vec<CombatEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<CombatEvent> {
        self.events
    }

    pub fn extend(&mut self, other: EventBus) {
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Render every non-silent event into the scene's log.
    pub fn commit_to_log(&self, scene: &mut Scene) {
        let lines: Vec<String> = self.events.iter().filter_map(|e| e.format(scene)).collect();
        for line in lines {
            scene.log.push(line);
        }
    }
}

impl std::fmt::Display for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for event in &self.events {
            writeln!(f, "  {:?}", event)?;
        }
        Ok(())
    }
}
