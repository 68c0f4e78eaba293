//! Static combat data: enemy templates, weapons and encounter tables.
//!
//! Everything here is loaded once from RON files under the data directory:
//!
//! ```text
//! data/
//!   enemies/goblin.ron      one EnemyTemplate per file, keyed by file stem
//!   weapons.ron             list of WeaponData
//!   encounters.ron          list of Encounter
//! ```

use crate::errors::{DataError, DataResult, PersistenceError, PersistenceResult};
use schema::{Encounter, EnemyTemplate, WeaponData};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    enemies: HashMap<String, EnemyTemplate>,
    weapons: HashMap<String, WeaponData>,
    encounters: Vec<Encounter>,
}

/// Lookup key for weapon names: "Iron Longsword" -> "iron_longsword".
pub fn weapon_key(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load all enemy templates, weapons and encounters from `data_path`.
    pub fn load(data_path: &Path) -> PersistenceResult<Catalog> {
        let mut catalog = Catalog::new();

        let enemies_dir = data_path.join("enemies");
        let entries = fs::read_dir(&enemies_dir).map_err(|e| PersistenceError::io(&enemies_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| PersistenceError::io(&enemies_dir, e))?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                if let Some(key) = path.file_stem().and_then(|s| s.to_str()) {
                    let content =
                        fs::read_to_string(&path).map_err(|e| PersistenceError::io(&path, e))?;
                    let template: EnemyTemplate = ron::from_str(&content)?;
                    catalog.enemies.insert(key.to_lowercase(), template);
                }
            }
        }

        let weapons_path = data_path.join("weapons.ron");
        if weapons_path.exists() {
            let content = fs::read_to_string(&weapons_path)
                .map_err(|e| PersistenceError::io(&weapons_path, e))?;
            let weapons: Vec<WeaponData> = ron::from_str(&content)?;
            for weapon in weapons {
                catalog = catalog.with_weapon(weapon);
            }
        }

        let encounters_path = data_path.join("encounters.ron");
        if encounters_path.exists() {
            let content = fs::read_to_string(&encounters_path)
                .map_err(|e| PersistenceError::io(&encounters_path, e))?;
            catalog.encounters = ron::from_str(&content)?;
        }

        tracing::info!(
            enemies = catalog.enemies.len(),
            weapons = catalog.weapons.len(),
            encounters = catalog.encounters.len(),
            "loaded combat catalog from {}",
            data_path.display()
        );
        Ok(catalog)
    }

    pub fn with_enemy(mut self, key: &str, template: EnemyTemplate) -> Self {
        self.enemies.insert(key.to_lowercase(), template);
        self
    }

    pub fn with_weapon(mut self, weapon: WeaponData) -> Self {
        self.weapons.insert(weapon_key(&weapon.name), weapon);
        self
    }

    pub fn with_encounter(mut self, name: &str, enemies: &[&str]) -> Self {
        self.encounters.push(Encounter {
            name: name.to_string(),
            enemies: enemies.iter().map(|e| e.to_string()).collect(),
        });
        self
    }

    pub fn enemy(&self, key: &str) -> DataResult<&EnemyTemplate> {
        self.enemies
            .get(&key.to_lowercase())
            .ok_or_else(|| DataError::EnemyTemplateNotFound(key.to_string()))
    }

    pub fn weapon(&self, name: &str) -> DataResult<&WeaponData> {
        self.weapons
            .get(&weapon_key(name))
            .ok_or_else(|| DataError::WeaponNotFound(name.to_string()))
    }

    pub fn encounters(&self) -> &[Encounter] {
        &self.encounters
    }

    /// Case-insensitive lookup by encounter name.
    pub fn encounter(&self, name: &str) -> DataResult<&Encounter> {
        self.encounters
            .iter()
            .find(|encounter| encounter.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| DataError::EncounterNotFound(name.to_string()))
    }

    /// Checks every encounter references known templates and every template's
    /// ranges are ordered.
    pub fn validate(&self) -> DataResult<()> {
        for (key, template) in &self.enemies {
            if template.hp_min > template.hp_max || template.xp_min > template.xp_max {
                return Err(DataError::MalformedData(format!(
                    "enemy template `{}` has an inverted hp or xp range",
                    key
                )));
            }
            if template.damage_min > template.damage_max {
                return Err(DataError::MalformedData(format!(
                    "enemy template `{}` has an inverted damage range",
                    key
                )));
            }
        }
        for weapon in self.weapons.values() {
            if weapon.damage_min > weapon.damage_max {
                return Err(DataError::MalformedData(format!(
                    "weapon `{}` has an inverted damage range",
                    weapon.name
                )));
            }
        }
        for encounter in &self.encounters {
            for key in &encounter.enemies {
                self.enemy(key)?;
            }
        }
        Ok(())
    }
}
