//! Engine settings, read from a RON file.
//!
//! ```ron
//! (
//!     data_dir: "data",
//!     scene_store_path: "state/scenes.json",
//!     rng_seed: Some(42),
//! )
//! ```
//!
//! Every field is optional; anything left out takes its default.

use crate::errors::{PersistenceError, PersistenceResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Enemy templates, weapons and encounters.
    pub data_dir: PathBuf,
    /// Active scenes, one JSON object keyed by scene id.
    pub scene_store_path: PathBuf,
    /// JSON lines of every scene that has ended.
    pub history_path: PathBuf,
    pub graveyard_path: PathBuf,
    pub backup_dir: PathBuf,
    pub characters_path: PathBuf,
    pub parties_path: PathBuf,
    /// Lines of combat log kept per scene.
    pub log_capacity: usize,
    /// Log lines included in a snapshot.
    pub snapshot_log_lines: usize,
    /// Upper bound on enemy turns resolved by one advance call.
    pub max_ai_turns: usize,
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            scene_store_path: PathBuf::from("state/scenes.json"),
            history_path: PathBuf::from("state/scene_history.jsonl"),
            graveyard_path: PathBuf::from("state/graveyard.jsonl"),
            backup_dir: PathBuf::from("state/backups"),
            characters_path: PathBuf::from("state/characters.json"),
            parties_path: PathBuf::from("state/parties.json"),
            log_capacity: 50,
            snapshot_log_lines: 10,
            max_ai_turns: 64,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Read the config at `path`, or the defaults when there is no such file.
    pub fn load(path: &Path) -> PersistenceResult<Self> {
        if !path.exists() {
            tracing::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
        let config = ron::from_str(&content)?;
        Ok(config)
    }
}
