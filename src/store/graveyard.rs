use crate::combat::state::SceneId;
use crate::errors::{PersistenceError, PersistenceResult};
use crate::store::{append_json_line, read_json_lines};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Permanent record of a player character that died in combat.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GraveyardRecord {
    pub character_id: String,
    pub name: String,
    pub level: u32,
    #[serde(default)]
    pub class: String,
    /// Whoever dealt the last damage, if anyone did.
    pub killed_by: Option<String>,
    pub scene: SceneId,
    pub round: u32,
}

/// Append-only log of fallen characters.
pub trait GraveyardLog: Send + Sync {
    fn append(&self, record: GraveyardRecord) -> PersistenceResult<()>;
    fn records(&self) -> PersistenceResult<Vec<GraveyardRecord>>;
}

#[derive(Debug, Default)]
pub struct InMemoryGraveyard {
    records: Mutex<Vec<GraveyardRecord>>,
}

impl InMemoryGraveyard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraveyardLog for InMemoryGraveyard {
    fn append(&self, record: GraveyardRecord) -> PersistenceResult<()> {
        self.records
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?
            .push(record);
        Ok(())
    }

    fn records(&self) -> PersistenceResult<Vec<GraveyardRecord>> {
        Ok(self
            .records
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?
            .clone())
    }
}

/// One JSON record per line.
#[derive(Debug)]
pub struct JsonlGraveyard {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlGraveyard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl GraveyardLog for JsonlGraveyard {
    fn append(&self, record: GraveyardRecord) -> PersistenceResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        append_json_line(&self.path, &record)
    }

    fn records(&self) -> PersistenceResult<Vec<GraveyardRecord>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?;
        read_json_lines(&self.path)
    }
}
