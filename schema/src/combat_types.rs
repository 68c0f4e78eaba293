use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, EnumString};

/// Which side of a scene a combatant fights for.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Faction {
    Friendly,
    Enemy,
}

impl Faction {
    pub fn opponent(self) -> Faction {
        match self {
            Faction::Friendly => Faction::Enemy,
            Faction::Enemy => Faction::Friendly,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Friendly => write!(f, "friendly"),
            Faction::Enemy => write!(f, "enemy"),
        }
    }
}

/// The two positional slots each faction has.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Line {
    #[default]
    #[strum(serialize = "frontline", serialize = "front")]
    Frontline,
    #[strum(serialize = "backline", serialize = "back")]
    Backline,
}

impl Line {
    pub fn other(self) -> Line {
        match self {
            Line::Frontline => Line::Backline,
            Line::Backline => Line::Frontline,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Frontline => write!(f, "frontline"),
            Line::Backline => write!(f, "backline"),
        }
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Stat {
    Strength,
    Dexterity,
    Intelligence,
    Willpower,
    Fortitude,
    Charisma,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DamageType {
    #[default]
    Bludgeoning,
    Slashing,
    Piercing,
    Bleed,
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bleed => "bleeding",
        };
        write!(f, "{}", name)
    }
}

/// Timed status effects a combatant can carry.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ConditionKind {
    Bleeding,
    Dazed,
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Bleeding => write!(f, "bleeding"),
            ConditionKind::Dazed => write!(f, "dazed"),
        }
    }
}

/// The closed set of named abilities a combatant may declare.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AbilityKind {
    Rend,
    Cleave,
    Bash,
    SecondWind,
}

impl AbilityKind {
    /// Parses a display or data-file name ("Second Wind", "second-wind", "SECOND_WIND").
    pub fn from_name(name: &str) -> Option<AbilityKind> {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");
        normalized.parse().ok()
    }
}

impl fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display_name = match self {
            AbilityKind::Rend => "Rend",
            AbilityKind::Cleave => "Cleave",
            AbilityKind::Bash => "Bash",
            AbilityKind::SecondWind => "Second Wind",
        };
        write!(f, "{}", display_name)
    }
}

/// The two action slots a combatant may spend once each per turn.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionSlot {
    Main,
    Side,
}

impl fmt::Display for ActionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSlot::Main => write!(f, "main action"),
            ActionSlot::Side => write!(f, "side action"),
        }
    }
}

/// Behavior tags declared by enemy templates.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AiBehavior {
    #[default]
    Melee,
    Ranged,
}
