//! Player characters as the combat engine sees them, and the store that owns them.
//!
//! Character creation, inventory and levelling live outside this crate; the
//! engine only reads characters when a scene starts and writes back hit points,
//! stamina and experience at persistence checkpoints.

use crate::errors::{PersistenceError, PersistenceResult};
use schema::{Line, Stat};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCharacter {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub class: String,
    pub stats: BTreeMap<Stat, i32>,
    pub current_hp: u32,
    pub max_hp: u32,
    pub current_stamina: u32,
    pub max_stamina: u32,
    pub armor: i32,
    pub speed: i32,
    /// Name of the equipped main-hand weapon; `None` fights unarmed.
    #[serde(default)]
    pub mainhand: Option<String>,
    #[serde(default)]
    pub action_skills: Vec<String>,
    #[serde(default)]
    pub sideaction_skills: Vec<String>,
    #[serde(default)]
    pub formation: Line,
    #[serde(default)]
    pub experience: u64,
}

impl PlayerCharacter {
    pub fn stat(&self, stat: Stat) -> i32 {
        self.stats.get(&stat).copied().unwrap_or(0)
    }
}

/// Bonus derived from a raw stat value: half the stat, rounded down.
pub fn stat_bonus(value: i32) -> i32 {
    value.div_euclid(2)
}

/// The external character store.
pub trait CharacterStore: Send + Sync {
    fn get(&self, id: &str) -> PersistenceResult<Option<PlayerCharacter>>;
    fn put(&self, character: PlayerCharacter) -> PersistenceResult<()>;
    /// Removes a character permanently. Returns the removed record, if any.
    fn remove(&self, id: &str) -> PersistenceResult<Option<PlayerCharacter>>;
}

#[derive(Debug, Default)]
pub struct InMemoryCharacterStore {
    characters: RwLock<HashMap<String, PlayerCharacter>>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_characters(characters: impl IntoIterator<Item = PlayerCharacter>) -> Self {
        let map = characters.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            characters: RwLock::new(map),
        }
    }
}

impl CharacterStore for InMemoryCharacterStore {
    fn get(&self, id: &str) -> PersistenceResult<Option<PlayerCharacter>> {
        let characters = self
            .characters
            .read()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        Ok(characters.get(id).cloned())
    }

    fn put(&self, character: PlayerCharacter) -> PersistenceResult<()> {
        let mut characters = self
            .characters
            .write()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        characters.insert(character.id.clone(), character);
        Ok(())
    }

    fn remove(&self, id: &str) -> PersistenceResult<Option<PlayerCharacter>> {
        let mut characters = self
            .characters
            .write()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        Ok(characters.remove(id))
    }
}

/// Characters kept in one JSON object keyed by character id.
#[derive(Debug)]
pub struct JsonCharacterStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonCharacterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    fn read_all(&self) -> PersistenceResult<BTreeMap<String, PlayerCharacter>> {
        read_json_map(&self.path)
    }

    fn write_all(&self, characters: &BTreeMap<String, PlayerCharacter>) -> PersistenceResult<()> {
        write_json_atomic(&self.path, characters)
    }
}

impl CharacterStore for JsonCharacterStore {
    fn get(&self, id: &str) -> PersistenceResult<Option<PlayerCharacter>> {
        let _guard = self
            .lock
            .read()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        Ok(self.read_all()?.remove(id))
    }

    fn put(&self, character: PlayerCharacter) -> PersistenceResult<()> {
        let _guard = self
            .lock
            .write()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        let mut characters = self.read_all()?;
        characters.insert(character.id.clone(), character);
        self.write_all(&characters)
    }

    fn remove(&self, id: &str) -> PersistenceResult<Option<PlayerCharacter>> {
        let _guard = self
            .lock
            .write()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        let mut characters = self.read_all()?;
        let removed = characters.remove(id);
        if removed.is_some() {
            self.write_all(&characters)?;
        }
        Ok(removed)
    }
}

/// Reads a JSON object file into a map; a missing file is an empty map.
pub(crate) fn read_json_map<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> PersistenceResult<BTreeMap<String, T>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Writes `value` as pretty JSON through a temporary sibling file and a rename,
/// so readers never observe a half-written file.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> PersistenceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
    }
    let content = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| PersistenceError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PersistenceError::io(path, e))?;
    Ok(())
}
