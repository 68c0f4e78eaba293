#[cfg(test)]
mod tests {
    use crate::character::{CharacterStore, InMemoryCharacterStore, PlayerCharacter};
    use crate::combat::actions::ActionRequest;
    use crate::combat::engine::{Collaborators, CombatEngine};
    use crate::combat::rng::CombatRng;
    use crate::combat::snapshot::SceneStatus;
    use crate::combat::state::{Scene, SceneId, Termination};
    use crate::combat::tests::common::{
        friendly, goblin, sample_catalog, sample_character, scene_with, test_engine,
    };
    use crate::config::EngineConfig;
    use crate::errors::{ActionRejection, CombatError, DataError, PersistenceError, PersistenceResult};
    use crate::party::StaticParties;
    use crate::store::{
        ArchivedScene, BackupStore, GraveyardLog, InMemoryBackupStore, InMemoryGraveyard,
        InMemorySceneStore, SceneStore,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use schema::{Encounter, Line};
    use pretty_assertions::assert_eq;

    fn brute_encounter() -> Encounter {
        Encounter {
            name: "Brute".to_string(),
            enemies: vec!["brute".to_string()],
        }
    }

    /// A lone, slow fighter so the brute always opens.
    fn slow_fighter(hp: u32) -> PlayerCharacter {
        let mut character = sample_character("1", "Aldric");
        character.speed = 0;
        character.current_hp = hp;
        character
    }

    #[test]
    fn test_advance_ai_runs_enemy_turns_until_a_player_is_up() {
        // Arrange: brute hp, initiative x2, then target pick, to-hit 10, damage 3
        let fixture = test_engine(
            vec![slow_fighter(100)],
            StaticParties::new(),
            CombatRng::new_for_test(vec![30, 5, 5, 0, 10, 3]),
        );
        let started = fixture.engine.start_encounter("1", &brute_encounter()).unwrap();
        assert_eq!(started.snapshot.active_id.as_deref(), Some("enemy_0_brute"));

        let early = fixture
            .engine
            .submit_action(&started.scene_id, ActionRequest::attack("1", "enemy_0_brute"))
            .unwrap();
        assert_eq!(
            early.rejection(),
            Some(&ActionRejection::NotYourTurn { actor: "1".into() })
        );

        // Act
        let outcomes = fixture.engine.advance_ai(&started.scene_id).unwrap();

        // Assert
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_accepted());
        let snapshot = fixture.engine.get_snapshot(&started.scene_id).unwrap();
        assert_eq!(snapshot.active_id.as_deref(), Some("1"));
        assert_eq!(snapshot.friendly_frontline[0].hp, 97);

        // nothing left for the AI to do
        assert!(fixture.engine.advance_ai(&started.scene_id).unwrap().is_empty());
    }

    #[test]
    fn test_abort_keeps_wounds_and_archives_the_scene() {
        let fixture = test_engine(
            vec![slow_fighter(100)],
            StaticParties::new(),
            CombatRng::new_for_test(vec![30, 5, 5, 0, 10, 3]),
        );
        let started = fixture.engine.start_encounter("1", &brute_encounter()).unwrap();
        fixture.engine.advance_ai(&started.scene_id).unwrap();

        let snapshot = fixture.engine.abort_scene(&started.scene_id).unwrap();

        assert_eq!(snapshot.status, SceneStatus::Aborted);
        assert_eq!(fixture.characters.get("1").unwrap().unwrap().current_hp, 97);
        assert_eq!(fixture.characters.get("1").unwrap().unwrap().experience, 0);
        assert_eq!(fixture.scenes.list().unwrap(), Vec::<SceneId>::new());
        assert_eq!(fixture.scenes.history().unwrap()[0].status, SceneStatus::Aborted);
        assert!(matches!(
            fixture.engine.get_snapshot(&started.scene_id),
            Err(CombatError::SceneNotFound(_))
        ));
    }

    #[test]
    fn test_fallen_player_is_buried_and_backed_up() {
        let fixture = test_engine(
            vec![slow_fighter(2)],
            StaticParties::new(),
            CombatRng::new_for_test(vec![30, 5, 5, 0, 10, 3]),
        );
        let started = fixture.engine.start_encounter("1", &brute_encounter()).unwrap();

        let outcomes = fixture.engine.advance_ai(&started.scene_id).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].termination, Some(Termination::FriendlyWipe));
        assert_eq!(outcomes[0].xp_awarded, 0);
        assert_eq!(fixture.characters.get("1").unwrap(), None);
        assert_eq!(fixture.backups.load("1").unwrap().map(|c| c.name), Some("Aldric".to_string()));

        let records = fixture.graveyard.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].killed_by.as_deref(), Some("Brute"));
        assert_eq!(records[0].level, 1);
    }

    #[test]
    fn test_default_formation_is_used_at_start() {
        let fixture = test_engine(
            vec![sample_character("1", "Aldric")],
            StaticParties::new(),
            CombatRng::new_for_test(vec![30, 5, 5]),
        );
        fixture.engine.set_default_formation("1", Line::Backline).unwrap();
        assert_eq!(fixture.characters.get("1").unwrap().unwrap().formation, Line::Backline);

        let started = fixture.engine.start_encounter("1", &brute_encounter()).unwrap();
        assert_eq!(started.snapshot.friendly_backline[0].id, "1");
        assert!(started.snapshot.friendly_frontline.is_empty());
    }

    #[test]
    fn test_party_members_without_characters_are_skipped() {
        let parties = StaticParties::new().with_party("Ashen", "1", &["1", "ghost"]);
        let fixture = test_engine(
            vec![sample_character("1", "Aldric")],
            parties,
            CombatRng::new_for_test(vec![30, 5, 5]),
        );
        let started = fixture.engine.start_encounter("1", &brute_encounter()).unwrap();
        assert_eq!(started.snapshot.turn_order.len(), 2);
    }

    #[test]
    fn test_start_without_any_character_is_a_data_error() {
        let fixture = test_engine(vec![], StaticParties::new(), CombatRng::new_for_test(vec![]));
        let err = fixture.engine.start_encounter("nobody", &brute_encounter()).unwrap_err();
        assert!(matches!(err, CombatError::Data(DataError::EmptyParty(_))));

        let missing = fixture.engine.set_default_formation("nobody", Line::Frontline).unwrap_err();
        assert!(matches!(missing, CombatError::Data(DataError::CharacterNotFound(_))));
    }

    #[test]
    fn test_random_encounter_comes_from_the_catalog() {
        // encounter pick 0 is the lone brute
        let fixture = test_engine(
            vec![sample_character("1", "Aldric")],
            StaticParties::new(),
            CombatRng::new_for_test(vec![0, 30, 5, 5]),
        );
        let started = fixture.engine.start_combat("1").unwrap();
        assert_eq!(started.snapshot.enemy_frontline[0].name, "Brute");
    }

    #[test]
    fn test_unknown_scene_is_not_found() {
        let fixture = test_engine(vec![], StaticParties::new(), CombatRng::new_for_test(vec![]));
        let missing = SceneId::new("missing");
        assert!(matches!(
            fixture.engine.submit_action(&missing, ActionRequest::end_turn("1")),
            Err(CombatError::SceneNotFound(_))
        ));
        assert!(matches!(
            fixture.engine.abort_scene(&missing),
            Err(CombatError::SceneNotFound(_))
        ));
        assert!(matches!(
            fixture.engine.advance_ai(&missing),
            Err(CombatError::SceneNotFound(_))
        ));
        assert_eq!(fixture.engine.tracked_locks(), 0);
    }

    /// Scene store whose archive can be switched off to simulate a full disk.
    struct FlakyArchive {
        inner: InMemorySceneStore,
        failing: AtomicBool,
    }

    impl SceneStore for FlakyArchive {
        fn get(&self, id: &SceneId) -> PersistenceResult<Option<Scene>> {
            self.inner.get(id)
        }

        fn put(&self, scene: &Scene) -> PersistenceResult<()> {
            self.inner.put(scene)
        }

        fn delete(&self, id: &SceneId) -> PersistenceResult<()> {
            self.inner.delete(id)
        }

        fn list(&self) -> PersistenceResult<Vec<SceneId>> {
            self.inner.list()
        }

        fn archive(&self, scene: &Scene, status: SceneStatus) -> PersistenceResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistenceError::io(
                    "history.jsonl",
                    std::io::Error::other("disk full"),
                ));
            }
            self.inner.archive(scene, status)
        }

        fn history(&self) -> PersistenceResult<Vec<ArchivedScene>> {
            self.inner.history()
        }
    }

    #[test]
    fn test_failed_archive_grants_nothing_and_retry_rewards_once() {
        // Arrange: goblin hp 6, initiative x2, then to-hit 10, damage 6, xp 10;
        // the retried blow rolls to-hit 10, damage 6, xp 10 again
        let characters = Arc::new(InMemoryCharacterStore::with_characters([sample_character("1", "Aldric")]));
        let scenes = Arc::new(FlakyArchive {
            inner: InMemorySceneStore::new(),
            failing: AtomicBool::new(true),
        });
        let stores = Collaborators {
            characters: characters.clone(),
            parties: Arc::new(StaticParties::new()),
            scenes: scenes.clone(),
            graveyard: Arc::new(InMemoryGraveyard::new()),
            backups: Arc::new(InMemoryBackupStore::new()),
        };
        let engine = CombatEngine::new(EngineConfig::default(), sample_catalog(), stores)
            .with_rng(CombatRng::new_for_test(vec![6, 5, 5, 10, 6, 10, 10, 6, 10]));
        let lone_goblin = Encounter {
            name: "Lone goblin".to_string(),
            enemies: vec!["goblin".to_string()],
        };
        let started = engine.start_encounter("1", &lone_goblin).unwrap();

        // Act: the killing blow cannot be archived
        let failed = engine.submit_action(&started.scene_id, ActionRequest::attack("1", "enemy_0_goblin"));

        // Assert: no character was touched and the stored scene is unchanged
        assert!(matches!(failed, Err(CombatError::Persistence(_))));
        assert_eq!(characters.get("1").unwrap().unwrap().experience, 0);
        let stored = engine.checked_scene(&started.scene_id).unwrap();
        assert_eq!(stored.get(&"enemy_0_goblin".into()).unwrap().hp, 6);

        // Act: the store recovers and the blow is struck again
        scenes.failing.store(false, Ordering::SeqCst);
        let outcome = engine
            .submit_action(&started.scene_id, ActionRequest::attack("1", "enemy_0_goblin"))
            .unwrap();

        // Assert: the reward lands exactly once
        assert_eq!(outcome.termination, Some(Termination::EnemyWipe));
        assert_eq!(outcome.xp_awarded, 10);
        assert_eq!(characters.get("1").unwrap().unwrap().experience, 10);
        assert_eq!(scenes.list().unwrap(), Vec::<SceneId>::new());
    }

    #[test]
    fn test_recover_reports_corrupt_scenes() {
        let fixture = test_engine(vec![], StaticParties::new(), CombatRng::new_for_test(vec![]));
        let healthy = scene_with(vec![friendly("1", "Aldric").build()], vec![goblin("g").build()]);
        let mut corrupt: Scene = healthy.clone();
        corrupt.id = SceneId::new("corrupt");
        corrupt.turn_order.push("stranger".into());
        fixture.scenes.put(&healthy).unwrap();
        fixture.scenes.put(&corrupt).unwrap();

        let report = fixture.engine.recover().unwrap();

        assert_eq!(report.healthy, vec![healthy.id.clone()]);
        assert_eq!(report.corrupt.len(), 1);
        assert_eq!(report.corrupt[0].0, SceneId::new("corrupt"));
        assert!(matches!(
            fixture.engine.checked_scene(&SceneId::new("corrupt")),
            Err(CombatError::CorruptScene { .. })
        ));
    }
}
