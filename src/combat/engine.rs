//! The request/response surface of the combat system.
//!
//! Every mutating call follows the same shape: take the scene's lock, load the
//! scene, work on a copy, persist, and only then hand back the new state. A
//! rejected action or a failed write leaves the stored scene as it was.

use crate::catalog::Catalog;
use crate::character::{CharacterStore, InMemoryCharacterStore, JsonCharacterStore};
use crate::combat::actions::{self, ActionRequest};
use crate::combat::ai::AiRegistry;
use crate::combat::combatant::{CombatantId, CombatantRegistry};
use crate::combat::resolution::{self, Sweep};
use crate::combat::rng::CombatRng;
use crate::combat::snapshot::{SceneStatus, Snapshot};
use crate::combat::state::{CombatEvent, EventBus, Scene, SceneId, Termination};
use crate::combat::turns;
use crate::config::EngineConfig;
use crate::errors::{
    ActionRejection, CombatError, CombatResult, DataError, PersistenceError, PersistenceResult,
};
use crate::party::{JsonPartyDirectory, PartyDirectory, StaticParties};
use crate::store::{
    BackupStore, GraveyardLog, InMemoryBackupStore, InMemoryGraveyard, InMemorySceneStore,
    JsonSceneStore, JsonlGraveyard, PostcardBackupStore, SceneStore,
};
use schema::{Encounter, Line};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// The external systems the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub characters: Arc<dyn CharacterStore>,
    pub parties: Arc<dyn PartyDirectory>,
    pub scenes: Arc<dyn SceneStore>,
    pub graveyard: Arc<dyn GraveyardLog>,
    pub backups: Arc<dyn BackupStore>,
}

impl Collaborators {
    /// File-backed stores at the locations named in `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            characters: Arc::new(JsonCharacterStore::new(&config.characters_path)),
            parties: Arc::new(JsonPartyDirectory::new(&config.parties_path)),
            scenes: Arc::new(JsonSceneStore::new(
                &config.scene_store_path,
                &config.history_path,
            )),
            graveyard: Arc::new(JsonlGraveyard::new(&config.graveyard_path)),
            backups: Arc::new(PostcardBackupStore::new(&config.backup_dir)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            characters: Arc::new(InMemoryCharacterStore::new()),
            parties: Arc::new(StaticParties::new()),
            scenes: Arc::new(InMemorySceneStore::new()),
            graveyard: Arc::new(InMemoryGraveyard::new()),
            backups: Arc::new(InMemoryBackupStore::new()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Accepted,
    Rejected(ActionRejection),
}

/// The reply to every action, player-submitted or AI-driven.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,
    pub events: Vec<CombatEvent>,
    /// The events rendered as log lines.
    pub messages: Vec<String>,
    pub snapshot: Snapshot,
    pub termination: Option<Termination>,
    /// Experience granted to each surviving player when the scene was won.
    pub xp_awarded: u64,
}

impl ActionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == OutcomeStatus::Accepted
    }

    pub fn rejection(&self) -> Option<&ActionRejection> {
        match &self.status {
            OutcomeStatus::Rejected(rejection) => Some(rejection),
            OutcomeStatus::Accepted => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StartedCombat {
    pub scene_id: SceneId,
    pub snapshot: Snapshot,
}

/// Result of re-reading the active scenes after a restart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryReport {
    pub healthy: Vec<SceneId>,
    pub corrupt: Vec<(SceneId, String)>,
}

pub struct CombatEngine {
    config: EngineConfig,
    catalog: Catalog,
    stores: Collaborators,
    ai: AiRegistry,
    rng: Mutex<CombatRng>,
    locks: Mutex<HashMap<SceneId, Arc<Mutex<()>>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> CombatError {
    CombatError::Persistence(PersistenceError::Poisoned(e.to_string()))
}

impl CombatEngine {
    pub fn new(config: EngineConfig, catalog: Catalog, stores: Collaborators) -> Self {
        let rng = CombatRng::from_config(config.rng_seed);
        Self {
            config,
            catalog,
            stores,
            ai: AiRegistry::new(),
            rng: Mutex::new(rng),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Load the catalog and open file-backed stores as configured.
    pub fn open(config: EngineConfig) -> CombatResult<Self> {
        let catalog = Catalog::load(&config.data_dir)?;
        catalog.validate()?;
        let stores = Collaborators::from_config(&config);
        Ok(Self::new(config, catalog, stores))
    }

    /// Replace the random source, e.g. with a scripted one.
    pub fn with_rng(mut self, rng: CombatRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn rng(&self) -> CombatResult<MutexGuard<'_, CombatRng>> {
        self.rng.lock().map_err(poisoned)
    }

    fn scene_lock(&self, id: &SceneId) -> CombatResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(poisoned)?;
        Ok(locks.entry(id.clone()).or_default().clone())
    }

    fn forget_lock(&self, id: &SceneId) -> CombatResult<()> {
        self.locks.lock().map_err(poisoned)?.remove(id);
        Ok(())
    }

    fn load(&self, id: &SceneId) -> CombatResult<Scene> {
        self.stores
            .scenes
            .get(id)?
            .ok_or_else(|| CombatError::SceneNotFound(id.clone()))
    }

    /// Load a scene whose lock is held. An unknown id leaves no lock behind.
    fn load_locked(&self, id: &SceneId) -> CombatResult<Scene> {
        match self.load(id) {
            Err(CombatError::SceneNotFound(missing)) => {
                self.forget_lock(id)?;
                Err(CombatError::SceneNotFound(missing))
            }
            other => other,
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }

    /// Log a failed write before it aborts the current operation.
    fn persisted<T>(&self, scene: &SceneId, what: &str, result: PersistenceResult<T>) -> CombatResult<T> {
        result.map_err(|e| {
            tracing::error!(scene = %scene, error = %e, "failed to persist {}", what);
            CombatError::from(e)
        })
    }

    fn snapshot(&self, scene: &Scene, status: SceneStatus) -> Snapshot {
        Snapshot::of(scene, status, self.config.snapshot_log_lines)
    }

    pub fn active_scenes(&self) -> CombatResult<Vec<SceneId>> {
        Ok(self.stores.scenes.list()?)
    }

    /// Start a fight for `requester` and their party against a random
    /// encounter from the catalog.
    pub fn start_combat(&self, requester: &str) -> CombatResult<StartedCombat> {
        let encounters = self.catalog.encounters();
        if encounters.is_empty() {
            return Err(DataError::NoEncounters.into());
        }
        let index = self.rng()?.pick(encounters.len(), "encounter");
        let encounter = encounters[index].clone();
        self.start_encounter(requester, &encounter)
    }

    /// Start a fight against a specific encounter.
    pub fn start_encounter(&self, requester: &str, encounter: &Encounter) -> CombatResult<StartedCombat> {
        let members = self.stores.parties.combat_group(requester)?;
        let registry = CombatantRegistry::new(&self.catalog, self.stores.characters.as_ref());

        let mut scene = Scene::new(SceneId::generate(), self.config.log_capacity);
        let mut bus = EventBus::new();
        bus.push(CombatEvent::CombatStarted {
            scene: scene.id.clone(),
        });

        for member in &members {
            match registry.resolve_player(member) {
                Ok(resolved) => {
                    let line = resolved.combatant.formation;
                    scene.add_combatant(resolved, line);
                }
                Err(CombatError::Data(DataError::CharacterNotFound(id))) => {
                    tracing::warn!(requester, member = %id, "party member has no character; skipped");
                }
                Err(e) => return Err(e),
            }
        }
        if scene.members(schema::Faction::Friendly).is_empty() {
            return Err(DataError::EmptyParty(requester.to_string()).into());
        }

        {
            let mut rng = self.rng()?;
            for (index, key) in encounter.enemies.iter().enumerate() {
                let resolved = registry.spawn_enemy(key, index, &mut rng)?;
                let line = resolved.combatant.formation;
                scene.add_combatant(resolved, line);
            }
            turns::initialize(&mut scene, &mut rng, &mut bus);
        }

        bus.commit_to_log(&mut scene);
        self.persisted(&scene.id, "new scene", self.stores.scenes.put(&scene))?;
        tracing::info!(
            scene = %scene.id,
            requester,
            encounter = %encounter.name,
            combatants = scene.turn_order.len(),
            "combat started"
        );

        Ok(StartedCombat {
            scene_id: scene.id.clone(),
            snapshot: self.snapshot(&scene, SceneStatus::Active),
        })
    }

    /// The single entry point for player-driven actions.
    pub fn submit_action(&self, scene_id: &SceneId, request: ActionRequest) -> CombatResult<ActionOutcome> {
        let lock = self.scene_lock(scene_id)?;
        let _guard = lock.lock().map_err(poisoned)?;
        let scene = self.load_locked(scene_id)?;

        let mut working = scene.clone();
        let mut bus = EventBus::new();
        let result = {
            let mut rng = self.rng()?;
            actions::resolve(&mut working, &mut rng, &mut bus, &request)
        };

        match result {
            Ok(executed) => self.commit(&mut working, bus, executed.sweep),
            Err(rejection) => {
                tracing::warn!(scene = %scene_id, actor = %request.actor, %rejection, "action rejected");
                Ok(ActionOutcome {
                    status: OutcomeStatus::Rejected(rejection),
                    events: Vec::new(),
                    messages: Vec::new(),
                    snapshot: self.snapshot(&scene, SceneStatus::Active),
                    termination: None,
                    xp_awarded: 0,
                })
            }
        }
    }

    /// Run enemy turns until a player is up or the scene ends. The scene lock
    /// is held for the whole run.
    pub fn advance_ai(&self, scene_id: &SceneId) -> CombatResult<Vec<ActionOutcome>> {
        let lock = self.scene_lock(scene_id)?;
        let _guard = lock.lock().map_err(poisoned)?;
        let mut scene = self.load_locked(scene_id)?;
        let mut outcomes = Vec::new();

        for _ in 0..self.config.max_ai_turns {
            let mut working = scene.clone();
            let mut bus = EventBus::new();
            let turn = {
                let mut rng = self.rng()?;
                self.ai.act(&mut working, &mut rng, &mut bus)
            };
            let Some(turn) = turn else {
                return Ok(outcomes);
            };
            tracing::debug!(scene = %scene_id, actor = %turn.actor, "{}", turn.message);

            let outcome = self.commit(&mut working, bus, turn.sweep)?;
            let over = outcome.termination.is_some();
            outcomes.push(outcome);
            if over {
                return Ok(outcomes);
            }
            scene = working;
        }

        tracing::warn!(scene = %scene_id, limit = self.config.max_ai_turns, "AI turn limit reached");
        Ok(outcomes)
    }

    /// Persist the result of an accepted action. The scene is written (or
    /// archived and removed) before any character is touched, so a failed
    /// scene write leaves characters as they were and a retried action cannot
    /// bury or reward anyone twice.
    fn commit(&self, scene: &mut Scene, mut bus: EventBus, sweep: Sweep) -> CombatResult<ActionOutcome> {
        let Some(termination) = sweep.termination else {
            let messages = render(&bus, scene);
            bus.commit_to_log(scene);
            self.persisted(&scene.id, "scene", self.stores.scenes.put(scene))?;
            self.bury(scene, &sweep.fallen)?;
            return Ok(ActionOutcome {
                status: OutcomeStatus::Accepted,
                events: bus.into_events(),
                messages,
                snapshot: self.snapshot(scene, SceneStatus::Active),
                termination: None,
                xp_awarded: 0,
            });
        };

        let rewards = match termination {
            Termination::EnemyWipe => resolution::compute_rewards(scene, &mut *self.rng()?),
            Termination::FriendlyWipe => resolution::Rewards::default(),
        };
        bus.push(CombatEvent::CombatEnded {
            termination,
            xp_each: rewards.per_survivor,
        });

        let messages = render(&bus, scene);
        bus.commit_to_log(scene);
        let status = SceneStatus::Ended(termination);
        self.persisted(&scene.id, "scene history", self.stores.scenes.archive(scene, status))?;
        self.persisted(&scene.id, "scene removal", self.stores.scenes.delete(&scene.id))?;
        self.forget_lock(&scene.id)?;

        self.bury(scene, &sweep.fallen)?;
        self.persisted(
            &scene.id,
            "survivors",
            resolution::persist_survivors(scene, self.stores.characters.as_ref(), rewards.per_survivor),
        )?;
        tracing::info!(
            scene = %scene.id,
            ?termination,
            xp_each = rewards.per_survivor,
            survivors = rewards.recipients.len(),
            "combat over"
        );

        Ok(ActionOutcome {
            status: OutcomeStatus::Accepted,
            events: bus.into_events(),
            messages,
            snapshot: self.snapshot(scene, status),
            termination: Some(termination),
            xp_awarded: rewards.per_survivor,
        })
    }

    fn bury(&self, scene: &Scene, fallen: &[CombatantId]) -> CombatResult<()> {
        if fallen.is_empty() {
            return Ok(());
        }
        self.persisted(
            &scene.id,
            "fallen characters",
            resolution::bury_fallen(
                scene,
                fallen,
                self.stores.characters.as_ref(),
                self.stores.graveyard.as_ref(),
                self.stores.backups.as_ref(),
            ),
        )
    }

    pub fn get_snapshot(&self, scene_id: &SceneId) -> CombatResult<Snapshot> {
        let scene = self.load(scene_id)?;
        Ok(self.snapshot(&scene, SceneStatus::Active))
    }

    /// Record which line a character steps into when a fight starts.
    pub fn set_default_formation(&self, character_id: &str, line: Line) -> CombatResult<()> {
        let mut character = self
            .stores
            .characters
            .get(character_id)?
            .ok_or_else(|| DataError::CharacterNotFound(character_id.to_string()))?;
        character.formation = line;
        self.stores.characters.put(character)?;
        tracing::info!(character_id, %line, "default formation updated");
        Ok(())
    }

    /// Abandon a scene: it is archived and discarded, then survivors keep
    /// their current hit points and stamina and nobody earns experience.
    pub fn abort_scene(&self, scene_id: &SceneId) -> CombatResult<Snapshot> {
        let lock = self.scene_lock(scene_id)?;
        let _guard = lock.lock().map_err(poisoned)?;
        let mut scene = self.load_locked(scene_id)?;

        let mut bus = EventBus::new();
        bus.push(CombatEvent::CombatAborted);
        bus.commit_to_log(&mut scene);

        self.persisted(scene_id, "scene history", self.stores.scenes.archive(&scene, SceneStatus::Aborted))?;
        self.persisted(scene_id, "scene removal", self.stores.scenes.delete(scene_id))?;
        self.forget_lock(scene_id)?;
        self.persisted(
            scene_id,
            "survivors",
            resolution::persist_survivors(&scene, self.stores.characters.as_ref(), 0),
        )?;
        tracing::info!(scene = %scene_id, "combat aborted");
        Ok(self.snapshot(&scene, SceneStatus::Aborted))
    }

    /// Re-read every active scene and check it is still consistent.
    pub fn recover(&self) -> CombatResult<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for id in self.stores.scenes.list()? {
            let Some(scene) = self.stores.scenes.get(&id)? else {
                continue;
            };
            match scene.validate_invariants() {
                Ok(()) => report.healthy.push(id),
                Err(details) => {
                    tracing::error!(scene = %id, %details, "stored scene is corrupt");
                    report.corrupt.push((id, details));
                }
            }
        }
        tracing::info!(
            healthy = report.healthy.len(),
            corrupt = report.corrupt.len(),
            "scene recovery complete"
        );
        Ok(report)
    }

    /// Load a scene and fail if it no longer satisfies its invariants.
    pub fn checked_scene(&self, scene_id: &SceneId) -> CombatResult<Scene> {
        let scene = self.load(scene_id)?;
        scene
            .validate_invariants()
            .map_err(|details| CombatError::CorruptScene {
                scene: scene_id.clone(),
                details,
            })?;
        Ok(scene)
    }
}

fn render(bus: &EventBus, scene: &Scene) -> Vec<String> {
    bus.events().iter().filter_map(|event| event.format(scene)).collect()
}
