//! Read-only projection of a scene for display.

use crate::combat::state::{Scene, Termination};
use schema::{Faction, Line};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a scene stands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneStatus {
    Active,
    Ended(Termination),
    Aborted,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CombatantView {
    pub id: String,
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub stamina: u32,
    pub conditions: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TurnEntry {
    pub id: String,
    pub name: String,
    pub initiative: i32,
    pub main_used: bool,
    pub side_used: bool,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub scene_id: String,
    pub status: SceneStatus,
    pub round: u32,
    /// Id and name of the combatant whose turn it is.
    pub active_id: Option<String>,
    pub active: Option<String>,
    pub friendly_frontline: Vec<CombatantView>,
    pub friendly_backline: Vec<CombatantView>,
    pub enemy_frontline: Vec<CombatantView>,
    pub enemy_backline: Vec<CombatantView>,
    pub turn_order: Vec<TurnEntry>,
    pub graveyard: Vec<String>,
    pub log: Vec<String>,
}

impl Snapshot {
    pub fn of(scene: &Scene, status: SceneStatus, log_lines: usize) -> Self {
        let view = |faction: Faction, line: Line| -> Vec<CombatantView> {
            scene
                .line(faction, line)
                .iter()
                .filter_map(|id| scene.get(id))
                .map(|state| CombatantView {
                    id: state.combatant.id.to_string(),
                    name: state.combatant.name.clone(),
                    hp: state.hp,
                    max_hp: state.combatant.max_hp,
                    stamina: state.stamina,
                    conditions: state
                        .conditions
                        .iter()
                        .map(|(condition, turns)| format!("{} ({})", condition, turns))
                        .collect(),
                })
                .collect()
        };

        let turn_order = scene
            .turn_order
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                scene.get(id).map(|state| {
                    let used = state.actions();
                    TurnEntry {
                        id: id.to_string(),
                        name: state.combatant.name.clone(),
                        initiative: state.initiative.unwrap_or_default(),
                        main_used: used.main,
                        side_used: used.side,
                        active: index == scene.turn_index,
                    }
                })
            })
            .collect();

        let active = match status {
            SceneStatus::Active => scene.active(),
            _ => None,
        };

        Snapshot {
            scene_id: scene.id.to_string(),
            status,
            round: scene.round,
            active_id: active.map(|state| state.combatant.id.to_string()),
            active: active.map(|state| state.combatant.name.clone()),
            friendly_frontline: view(Faction::Friendly, Line::Frontline),
            friendly_backline: view(Faction::Friendly, Line::Backline),
            enemy_frontline: view(Faction::Enemy, Line::Frontline),
            enemy_backline: view(Faction::Enemy, Line::Backline),
            turn_order,
            graveyard: scene
                .graveyard_friendly
                .iter()
                .chain(&scene.graveyard_enemy)
                .map(|id| scene.name_of(id))
                .collect(),
            log: scene.log.recent(log_lines),
        }
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, label: &str, members: &[CombatantView]) -> fmt::Result {
    write!(f, "  {:<16}", label)?;
    if members.is_empty() {
        return writeln!(f, "-");
    }
    let rendered: Vec<String> = members
        .iter()
        .map(|m| {
            let mut entry = format!("{} {}/{}", m.name, m.hp, m.max_hp);
            if !m.conditions.is_empty() {
                entry.push_str(&format!(" [{}]", m.conditions.join(", ")));
            }
            entry
        })
        .collect();
    writeln!(f, "{}", rendered.join(" | "))
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            SceneStatus::Active => writeln!(f, "=== Combat {} | Round {} ===", self.scene_id, self.round)?,
            SceneStatus::Ended(Termination::EnemyWipe) => writeln!(f, "=== Combat {} | Victory ===", self.scene_id)?,
            SceneStatus::Ended(Termination::FriendlyWipe) => writeln!(f, "=== Combat {} | Defeat ===", self.scene_id)?,
            SceneStatus::Aborted => writeln!(f, "=== Combat {} | Abandoned ===", self.scene_id)?,
        }

        write_line(f, "Enemy back:", &self.enemy_backline)?;
        write_line(f, "Enemy front:", &self.enemy_frontline)?;
        write_line(f, "Party front:", &self.friendly_frontline)?;
        write_line(f, "Party back:", &self.friendly_backline)?;

        if !self.turn_order.is_empty() {
            writeln!(f, "Turn order:")?;
            for entry in &self.turn_order {
                writeln!(
                    f,
                    "  {} {} ({}) {}{}",
                    if entry.active { ">" } else { " " },
                    entry.name,
                    entry.initiative,
                    if entry.main_used { "A✓" } else { "A " },
                    if entry.side_used { "S✓" } else { "S " },
                )?;
            }
        }
        if !self.graveyard.is_empty() {
            writeln!(f, "Fallen: {}", self.graveyard.join(", "))?;
        }
        if !self.log.is_empty() {
            writeln!(f, "Log:")?;
            for line in &self.log {
                writeln!(f, "  {}", line)?;
            }
        }
        Ok(())
    }
}
