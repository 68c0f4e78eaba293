use crate::character::{read_json_map, write_json_atomic};
use crate::combat::snapshot::SceneStatus;
use crate::combat::state::{Scene, SceneId};
use crate::errors::{PersistenceError, PersistenceResult};
use crate::store::{append_json_line, read_json_lines};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Final state of a scene that has left the active collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchivedScene {
    pub status: SceneStatus,
    pub scene: Scene,
}

/// The collection of active scenes, keyed by scene id, plus an audit archive
/// of scenes that have ended.
pub trait SceneStore: Send + Sync {
    fn get(&self, id: &SceneId) -> PersistenceResult<Option<Scene>>;
    fn put(&self, scene: &Scene) -> PersistenceResult<()>;
    fn delete(&self, id: &SceneId) -> PersistenceResult<()>;
    fn list(&self) -> PersistenceResult<Vec<SceneId>>;
    fn archive(&self, scene: &Scene, status: SceneStatus) -> PersistenceResult<()>;
    fn history(&self) -> PersistenceResult<Vec<ArchivedScene>>;
}

#[derive(Debug, Default)]
pub struct InMemorySceneStore {
    scenes: Mutex<BTreeMap<SceneId, Scene>>,
    history: Mutex<Vec<ArchivedScene>>,
}

impl InMemorySceneStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> PersistenceError {
    PersistenceError::Poisoned(e.to_string())
}

impl SceneStore for InMemorySceneStore {
    fn get(&self, id: &SceneId) -> PersistenceResult<Option<Scene>> {
        Ok(self.scenes.lock().map_err(poisoned)?.get(id).cloned())
    }

    fn put(&self, scene: &Scene) -> PersistenceResult<()> {
        self.scenes
            .lock()
            .map_err(poisoned)?
            .insert(scene.id.clone(), scene.clone());
        Ok(())
    }

    fn delete(&self, id: &SceneId) -> PersistenceResult<()> {
        self.scenes.lock().map_err(poisoned)?.remove(id);
        Ok(())
    }

    fn list(&self) -> PersistenceResult<Vec<SceneId>> {
        Ok(self.scenes.lock().map_err(poisoned)?.keys().cloned().collect())
    }

    fn archive(&self, scene: &Scene, status: SceneStatus) -> PersistenceResult<()> {
        self.history.lock().map_err(poisoned)?.push(ArchivedScene {
            status,
            scene: scene.clone(),
        });
        Ok(())
    }

    fn history(&self) -> PersistenceResult<Vec<ArchivedScene>> {
        Ok(self.history.lock().map_err(poisoned)?.clone())
    }
}

/// Active scenes in one JSON object keyed by scene id, rewritten atomically on
/// every change. Ended scenes are appended to a JSON-lines history file.
#[derive(Debug)]
pub struct JsonSceneStore {
    path: PathBuf,
    history_path: PathBuf,
    lock: Mutex<()>,
}

impl JsonSceneStore {
    pub fn new(path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            history_path: history_path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> PersistenceResult<BTreeMap<String, Scene>> {
        read_json_map(&self.path)
    }
}

impl SceneStore for JsonSceneStore {
    fn get(&self, id: &SceneId) -> PersistenceResult<Option<Scene>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.read_all()?.remove(id.as_str()))
    }

    fn put(&self, scene: &Scene) -> PersistenceResult<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut scenes = self.read_all()?;
        scenes.insert(scene.id.to_string(), scene.clone());
        write_json_atomic(&self.path, &scenes)
    }

    fn delete(&self, id: &SceneId) -> PersistenceResult<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut scenes = self.read_all()?;
        if scenes.remove(id.as_str()).is_some() {
            write_json_atomic(&self.path, &scenes)?;
        }
        Ok(())
    }

    fn list(&self) -> PersistenceResult<Vec<SceneId>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.read_all()?.into_keys().map(SceneId::new).collect())
    }

    fn archive(&self, scene: &Scene, status: SceneStatus) -> PersistenceResult<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        append_json_line(
            &self.history_path,
            &ArchivedScene {
                status,
                scene: scene.clone(),
            },
        )
    }

    fn history(&self) -> PersistenceResult<Vec<ArchivedScene>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        read_json_lines(&self.history_path)
    }
}
