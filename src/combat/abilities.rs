//! The closed set of combat abilities and what each one costs and does.

use crate::combat::combatant::DamageProfile;
use schema::{AbilityKind, ActionSlot, ConditionKind, DamageType};

/// Who an ability is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Targeting {
    /// One chosen combatant.
    Single,
    /// Every member of the opposing exposed line.
    OpposingLine,
    /// The user.
    User,
}

/// What an ability does once it lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityEffect {
    /// A to-hit roll followed by damage. `damage` of `None` strikes with the
    /// user's weapon. A hit attaches `condition` for the given number of turns.
    Strike {
        damage: Option<DamageProfile>,
        condition: Option<(ConditionKind, u8)>,
    },
    /// Restores hit points to the user, capped at maximum.
    Heal { min: u32, max: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityProfile {
    pub kind: AbilityKind,
    pub slot: ActionSlot,
    pub stamina_cost: u32,
    /// Rounds the ability stays unavailable after use.
    pub cooldown: u8,
    pub targeting: Targeting,
    pub effect: AbilityEffect,
}

impl AbilityProfile {
    pub fn needs_target(&self) -> bool {
        self.targeting == Targeting::Single
    }
}

/// Look up the profile of an ability.
pub fn profile(kind: AbilityKind) -> AbilityProfile {
    match kind {
        AbilityKind::Rend => AbilityProfile {
            kind,
            slot: ActionSlot::Main,
            stamina_cost: 0,
            cooldown: 2,
            targeting: Targeting::Single,
            effect: AbilityEffect::Strike {
                damage: Some(DamageProfile::new(1, 3, DamageType::Slashing)),
                condition: Some((ConditionKind::Bleeding, 2)),
            },
        },
        AbilityKind::Cleave => AbilityProfile {
            kind,
            slot: ActionSlot::Main,
            stamina_cost: 2,
            cooldown: 3,
            targeting: Targeting::OpposingLine,
            effect: AbilityEffect::Strike {
                damage: None,
                condition: None,
            },
        },
        AbilityKind::Bash => AbilityProfile {
            kind,
            slot: ActionSlot::Side,
            stamina_cost: 1,
            cooldown: 2,
            targeting: Targeting::Single,
            effect: AbilityEffect::Strike {
                damage: Some(DamageProfile::new(1, 2, DamageType::Bludgeoning)),
                condition: Some((ConditionKind::Dazed, 2)),
            },
        },
        AbilityKind::SecondWind => AbilityProfile {
            kind,
            slot: ActionSlot::Side,
            stamina_cost: 1,
            cooldown: 3,
            targeting: Targeting::User,
            effect: AbilityEffect::Heal { min: 2, max: 5 },
        },
    }
}
