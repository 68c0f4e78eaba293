use crate::catalog::Catalog;
use crate::character::{InMemoryCharacterStore, PlayerCharacter};
use crate::combat::combatant::{Combatant, CombatantId, CombatantKind, DamageProfile, Resolved};
use crate::combat::engine::{ActionOutcome, Collaborators, CombatEngine};
use crate::combat::rng::CombatRng;
use crate::combat::state::{EventBus, Scene, SceneId};
use crate::combat::turns;
use crate::config::EngineConfig;
use crate::party::StaticParties;
use crate::store::{InMemoryBackupStore, InMemoryGraveyard, InMemorySceneStore};
use schema::{
    AbilityKind, AiBehavior, DamageType, EnemyTemplate, Faction, Line, Stat, WeaponData,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A builder for test combatants with common defaults.
///
/// # Example
/// ```
/// let aldric = friendly("1", "Aldric")
///     .speed(7)
///     .skills(&[AbilityKind::Rend])
///     .build();
/// ```
pub struct TestCombatantBuilder {
    combatant: Combatant,
    hp: Option<u32>,
}

impl TestCombatantBuilder {
    /// Creates a new builder: 100 HP, armor 10, speed 5, no bonus, a 1-6
    /// slashing weapon and no abilities.
    pub fn new(id: &str, name: &str, faction: Faction) -> Self {
        let kind = match faction {
            Faction::Friendly => CombatantKind::Player { level: 1 },
            Faction::Enemy => CombatantKind::Enemy {
                template: name.to_lowercase(),
                behavior: AiBehavior::Melee,
                hp_range: (100, 100),
                xp_range: (10, 10),
            },
        };
        Self {
            combatant: Combatant {
                id: CombatantId::new(id),
                name: name.to_string(),
                faction,
                kind,
                max_hp: 100,
                armor: 10,
                speed: 5,
                to_hit_bonus: 0,
                weapon: DamageProfile::new(1, 6, DamageType::Slashing),
                max_stamina: 0,
                action_skills: Vec::new(),
                side_skills: Vec::new(),
                resistances: Vec::new(),
                formation: Line::Frontline,
            },
            hp: None,
        }
    }

    /// Sets maximum HP. Current HP starts at the maximum.
    pub fn hp(mut self, hp: u32) -> Self {
        self.combatant.max_hp = hp;
        if let CombatantKind::Enemy { hp_range, .. } = &mut self.combatant.kind {
            *hp_range = (hp, hp);
        }
        self
    }

    /// Sets current HP below the maximum.
    pub fn wounded(mut self, hp: u32) -> Self {
        self.hp = Some(hp);
        self
    }

    pub fn armor(mut self, armor: i32) -> Self {
        self.combatant.armor = armor;
        self
    }

    pub fn speed(mut self, speed: i32) -> Self {
        self.combatant.speed = speed;
        self
    }

    pub fn bonus(mut self, bonus: i32) -> Self {
        self.combatant.to_hit_bonus = bonus;
        self
    }

    pub fn weapon(mut self, min: u32, max: u32, damage_type: DamageType) -> Self {
        self.combatant.weapon = DamageProfile::new(min, max, damage_type);
        self
    }

    pub fn skills(mut self, skills: &[AbilityKind]) -> Self {
        self.combatant.action_skills = skills.to_vec();
        self
    }

    pub fn side_skills(mut self, skills: &[AbilityKind]) -> Self {
        self.combatant.side_skills = skills.to_vec();
        self
    }

    pub fn stamina(mut self, stamina: u32) -> Self {
        self.combatant.max_stamina = stamina;
        self
    }

    pub fn resist(mut self, damage_type: DamageType) -> Self {
        self.combatant.resistances.push(damage_type);
        self
    }

    pub fn line(mut self, line: Line) -> Self {
        self.combatant.formation = line;
        self
    }

    pub fn xp(mut self, min: u32, max: u32) -> Self {
        if let CombatantKind::Enemy { xp_range, .. } = &mut self.combatant.kind {
            *xp_range = (min, max);
        }
        self
    }

    pub fn behavior(mut self, behavior: AiBehavior) -> Self {
        if let CombatantKind::Enemy { behavior: slot, .. } = &mut self.combatant.kind {
            *slot = behavior;
        }
        self
    }

    pub fn build(self) -> Resolved {
        Resolved {
            hp: self.hp.unwrap_or(self.combatant.max_hp).min(self.combatant.max_hp),
            stamina: self.combatant.max_stamina,
            combatant: self.combatant,
        }
    }
}

/// A friendly player combatant with the builder defaults.
pub fn friendly(id: &str, name: &str) -> TestCombatantBuilder {
    TestCombatantBuilder::new(id, name, Faction::Friendly)
}

/// A 30 HP, armor 8, speed 3 melee goblin.
pub fn goblin(id: &str) -> TestCombatantBuilder {
    TestCombatantBuilder::new(id, "Goblin", Faction::Enemy)
        .hp(30)
        .armor(8)
        .speed(3)
}

/// Places everyone on their formation line without rolling initiative.
pub fn scene_unrolled(friendlies: Vec<Resolved>, enemies: Vec<Resolved>) -> Scene {
    let mut scene = Scene::new(SceneId::new("test_scene"), 50);
    for resolved in friendlies.into_iter().chain(enemies) {
        let line = resolved.combatant.formation;
        scene.add_combatant(resolved, line);
    }
    scene
}

/// A ready-to-play scene. Every initiative roll is 5, so the order follows
/// speed and ties follow the order given.
pub fn scene_with(friendlies: Vec<Resolved>, enemies: Vec<Resolved>) -> Scene {
    let mut scene = scene_unrolled(friendlies, enemies);
    let rolls = vec![5; scene.roster.len()];
    turns::initialize(&mut scene, &mut CombatRng::new_for_test(rolls), &mut EventBus::new());
    scene
}

/// A `CombatRng` with a long run of middling values, for tests where the
/// exact outcomes do not matter.
pub fn predictable_rng() -> CombatRng {
    CombatRng::new_for_test(vec![5; 200])
}

pub fn goblin_template() -> EnemyTemplate {
    EnemyTemplate {
        name: "Goblin".to_string(),
        hp_min: 6,
        hp_max: 10,
        xp_min: 8,
        xp_max: 12,
        armor: 8,
        speed: 3,
        attack_bonus: 1,
        damage_min: 1,
        damage_max: 4,
        damage_type: DamageType::Slashing,
        stamina: 0,
        formation: Line::Frontline,
        ai: AiBehavior::Melee,
        action_skills: vec![AbilityKind::Rend],
        side_skills: Vec::new(),
        resistances: Vec::new(),
    }
}

/// The 30 HP, armor 8, speed 3 training dummy from the basic duel scenario.
pub fn brute_template() -> EnemyTemplate {
    EnemyTemplate {
        name: "Brute".to_string(),
        hp_min: 30,
        hp_max: 30,
        xp_min: 20,
        xp_max: 20,
        armor: 8,
        speed: 3,
        attack_bonus: 0,
        damage_min: 2,
        damage_max: 4,
        damage_type: DamageType::Bludgeoning,
        stamina: 0,
        formation: Line::Frontline,
        ai: AiBehavior::Melee,
        action_skills: Vec::new(),
        side_skills: Vec::new(),
        resistances: Vec::new(),
    }
}

pub fn sample_catalog() -> Catalog {
    Catalog::new()
        .with_enemy("goblin", goblin_template())
        .with_enemy("brute", brute_template())
        .with_weapon(WeaponData {
            name: "Iron Longsword".to_string(),
            stat: Stat::Strength,
            damage_min: 2,
            damage_max: 6,
            damage_type: DamageType::Slashing,
        })
        .with_weapon(WeaponData {
            name: "Iron Dagger".to_string(),
            stat: Stat::Dexterity,
            damage_min: 1,
            damage_max: 4,
            damage_type: DamageType::Piercing,
        })
        .with_encounter("Brute", &["brute"])
        .with_encounter("Goblin pair", &["goblin", "goblin"])
}

/// A level 1 fighter: 100 HP, armor 10, speed 5, longsword, Strength 0.
pub fn sample_character(id: &str, name: &str) -> PlayerCharacter {
    PlayerCharacter {
        id: id.to_string(),
        name: name.to_string(),
        level: 1,
        class: "Fighter".to_string(),
        stats: BTreeMap::from([(Stat::Strength, 0), (Stat::Dexterity, 0)]),
        current_hp: 100,
        max_hp: 100,
        current_stamina: 3,
        max_stamina: 3,
        armor: 10,
        speed: 5,
        mainhand: Some("Iron Longsword".to_string()),
        action_skills: Vec::new(),
        sideaction_skills: Vec::new(),
        formation: Line::Frontline,
        experience: 0,
    }
}

/// An engine over in-memory stores, with handles kept for inspection.
pub struct TestEngine {
    pub engine: CombatEngine,
    pub characters: Arc<InMemoryCharacterStore>,
    pub scenes: Arc<InMemorySceneStore>,
    pub graveyard: Arc<InMemoryGraveyard>,
    pub backups: Arc<InMemoryBackupStore>,
}

pub fn test_engine(characters: Vec<PlayerCharacter>, parties: StaticParties, rng: CombatRng) -> TestEngine {
    let characters = Arc::new(InMemoryCharacterStore::with_characters(characters));
    let scenes = Arc::new(InMemorySceneStore::new());
    let graveyard = Arc::new(InMemoryGraveyard::new());
    let backups = Arc::new(InMemoryBackupStore::new());
    let stores = Collaborators {
        characters: characters.clone(),
        parties: Arc::new(parties),
        scenes: scenes.clone(),
        graveyard: graveyard.clone(),
        backups: backups.clone(),
    };
    let engine = CombatEngine::new(EngineConfig::default(), sample_catalog(), stores).with_rng(rng);
    TestEngine {
        engine,
        characters,
        scenes,
        graveyard,
        backups,
    }
}

/// Asserts an outcome was accepted and returns it.
pub fn assert_accepted(outcome: ActionOutcome) -> ActionOutcome {
    if let Some(rejection) = outcome.rejection() {
        panic!("Expected the action to be accepted but it was rejected: {}", rejection);
    }
    outcome
}
