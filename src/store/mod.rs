//! Durable homes for scenes, the graveyard and character backups.

pub mod backup;
pub mod graveyard;
pub mod scenes;

pub use backup::{BackupStore, InMemoryBackupStore, PostcardBackupStore};
pub use graveyard::{GraveyardLog, GraveyardRecord, InMemoryGraveyard, JsonlGraveyard};
pub use scenes::{ArchivedScene, InMemorySceneStore, JsonSceneStore, SceneStore};

use crate::errors::{PersistenceError, PersistenceResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Append one JSON document as a line to `path`, creating it if needed.
pub(crate) fn append_json_line<T: Serialize>(path: &Path, value: &T) -> PersistenceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;
        }
    }
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| PersistenceError::io(path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| PersistenceError::io(path, e))?;
    Ok(())
}

/// Read every line of a JSON-lines file. A missing file reads as empty.
pub(crate) fn read_json_lines<T: DeserializeOwned>(path: &Path) -> PersistenceResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|e| PersistenceError::io(path, e))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(PersistenceError::from))
        .collect()
}
