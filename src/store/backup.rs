use crate::character::PlayerCharacter;
use crate::errors::{PersistenceError, PersistenceResult};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Full character snapshots kept for manual recovery after a permanent death.
pub trait BackupStore: Send + Sync {
    fn save(&self, character: &PlayerCharacter) -> PersistenceResult<()>;
    fn load(&self, character_id: &str) -> PersistenceResult<Option<PlayerCharacter>>;
}

#[derive(Debug, Default)]
pub struct InMemoryBackupStore {
    snapshots: Mutex<HashMap<String, PlayerCharacter>>,
}

impl InMemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackupStore for InMemoryBackupStore {
    fn save(&self, character: &PlayerCharacter) -> PersistenceResult<()> {
        self.snapshots
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?
            .insert(character.id.clone(), character.clone());
        Ok(())
    }

    fn load(&self, character_id: &str) -> PersistenceResult<Option<PlayerCharacter>> {
        Ok(self
            .snapshots
            .lock()
            .map_err(|e| PersistenceError::Poisoned(e.to_string()))?
            .get(character_id)
            .cloned())
    }
}

/// One postcard-encoded file per character: `<dir>/<id>.bin`.
#[derive(Debug, Clone)]
pub struct PostcardBackupStore {
    dir: PathBuf,
}

impl PostcardBackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, character_id: &str) -> PathBuf {
        let safe: String = character_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.bin", safe))
    }
}

impl BackupStore for PostcardBackupStore {
    fn save(&self, character: &PlayerCharacter) -> PersistenceResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;
        let bytes = postcard::to_allocvec(character)?;
        let path = self.path_for(&character.id);
        fs::write(&path, bytes).map_err(|e| PersistenceError::io(&path, e))?;
        Ok(())
    }

    fn load(&self, character_id: &str) -> PersistenceResult<Option<PlayerCharacter>> {
        let path = self.path_for(character_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| PersistenceError::io(&path, e))?;
        Ok(Some(postcard::from_bytes(&bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::tests::common::sample_character;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_postcard_backup_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = PostcardBackupStore::new(dir.path().join("backups"));
        let character = sample_character("12", "Tamsin");

        assert_eq!(store.load("12").expect("read"), None);
        store.save(&character).expect("save");
        assert_eq!(store.load("12").expect("read"), Some(character));
    }
}
