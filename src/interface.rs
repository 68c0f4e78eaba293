//! Text front end shared by the CLI and the MCP server.
//!
//! Commands are parsed from single lines, run against a [`CombatEngine`] on
//! behalf of one requester, and answered with plain text.

use crate::combat::actions::ActionRequest;
use crate::combat::combatant::CombatantId;
use crate::combat::engine::{ActionOutcome, CombatEngine};
use crate::combat::snapshot::Snapshot;
use crate::combat::state::{SceneId, Termination};
use crate::errors::CombatResult;
use schema::{AbilityKind, Line};

pub const HELP: &str = "\
Commands:
  start [encounter]        begin a fight (random encounter if none is named)
  attack <target>          basic weapon attack
  move                     step to your other line
  ability <name> [target]  use a known ability, e.g. 'ability rend enemy_0_goblin'
  end                      end the current turn
  ai                       let the enemies take their turns
  show                     print the battlefield
  formation <front|back>   choose your line for the next fight
  abort                    abandon the fight
  help                     this list";

const NO_COMBAT: &str = "No combat in progress. Use 'start' to begin.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { encounter: Option<String> },
    Attack { target: String },
    Move,
    Ability { name: String, target: Option<String> },
    End,
    Ai,
    Show,
    Formation(Line),
    Abort,
    Help,
}

/// Parses one line of input into a [`Command`].
pub fn parse_command(input: &str) -> Result<Command, String> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    let Some((verb, args)) = parts.split_first() else {
        return Err("Type a command, or 'help' for the list.".to_string());
    };

    match verb.to_lowercase().as_str() {
        "start" => Ok(Command::Start {
            encounter: (!args.is_empty()).then(|| args.join(" ")),
        }),
        "attack" | "a" => match args {
            [target] => Ok(Command::Attack {
                target: target.to_string(),
            }),
            _ => Err("Usage: attack <target>".to_string()),
        },
        "move" | "m" => Ok(Command::Move),
        "ability" | "use" => parse_ability(args),
        "end" | "e" => Ok(Command::End),
        "ai" => Ok(Command::Ai),
        "show" | "status" => Ok(Command::Show),
        "formation" => match args {
            [line] => line
                .parse::<Line>()
                .map(Command::Formation)
                .map_err(|_| format!("Unknown line '{}'. Use 'front' or 'back'.", line)),
            _ => Err("Usage: formation <front|back>".to_string()),
        },
        "abort" => Ok(Command::Abort),
        "help" | "?" => Ok(Command::Help),
        other => Err(format!("Unknown command '{}'. Type 'help' for the list.", other)),
    }
}

/// Ability names may span several words ("second wind"), so the last word is
/// only taken as a target when the full text is not an ability name.
fn parse_ability(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("Usage: ability <name> [target]".to_string());
    }
    let whole = args.join(" ");
    if AbilityKind::from_name(&whole).is_some() || args.len() == 1 {
        return Ok(Command::Ability {
            name: whole,
            target: None,
        });
    }
    let (target, name) = args.split_last().map(|(t, n)| (t.to_string(), n.join(" "))).unwrap_or_default();
    Ok(Command::Ability {
        name,
        target: Some(target),
    })
}

/// One requester's view of the engine: which scene they are fighting in.
#[derive(Debug, Clone)]
pub struct Session {
    requester: String,
    scene: Option<SceneId>,
}

impl Session {
    pub fn new(requester: impl Into<String>) -> Self {
        Self {
            requester: requester.into(),
            scene: None,
        }
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn scene(&self) -> Option<&SceneId> {
        self.scene.as_ref()
    }

    /// Pick up a scene that is already running, e.g. after a restart.
    pub fn resume(&mut self, scene: SceneId) {
        self.scene = Some(scene);
    }

    pub fn execute(&mut self, engine: &CombatEngine, command: Command) -> CombatResult<String> {
        match command {
            Command::Help => Ok(HELP.to_string()),
            Command::Formation(line) => {
                engine.set_default_formation(&self.requester, line)?;
                Ok(format!("You will take the {} when the next fight starts.", line))
            }
            Command::Start { encounter } => self.start(engine, encounter.as_deref()),
            Command::Show => match &self.scene {
                Some(scene_id) => Ok(engine.get_snapshot(scene_id)?.to_string()),
                None => Ok(NO_COMBAT.to_string()),
            },
            Command::Ai => self.advance(engine),
            Command::Abort => self.abort(engine),
            Command::Attack { target } => {
                self.act(engine, |actor| ActionRequest::attack(actor, target.as_str()))
            }
            Command::Move => self.act(engine, |actor| ActionRequest::movement(actor)),
            Command::Ability { name, target } => self.act(engine, |actor| {
                ActionRequest::ability(actor, &name, target.as_deref().map(CombatantId::from))
            }),
            Command::End => self.act(engine, |actor| ActionRequest::end_turn(actor)),
        }
    }

    fn start(&mut self, engine: &CombatEngine, encounter: Option<&str>) -> CombatResult<String> {
        if let Some(scene_id) = &self.scene {
            return Ok(format!(
                "Already fighting in scene {}. Use 'abort' to leave it.",
                scene_id
            ));
        }
        let started = match encounter {
            Some(name) => {
                let encounter = engine.catalog().encounter(name)?.clone();
                engine.start_encounter(&self.requester, &encounter)?
            }
            None => engine.start_combat(&self.requester)?,
        };
        self.scene = Some(started.scene_id);
        Ok(started.snapshot.to_string())
    }

    fn advance(&mut self, engine: &CombatEngine) -> CombatResult<String> {
        let Some(scene_id) = self.scene.clone() else {
            return Ok(NO_COMBAT.to_string());
        };
        let outcomes = engine.advance_ai(&scene_id)?;
        let Some(last) = outcomes.last() else {
            return Ok("No enemy is waiting to act.".to_string());
        };
        self.follow(last);

        let mut output = String::new();
        for outcome in &outcomes[..outcomes.len() - 1] {
            for message in &outcome.messages {
                output.push_str(message);
                output.push('\n');
            }
        }
        output.push_str(&render_outcome(last));
        Ok(output)
    }

    fn abort(&mut self, engine: &CombatEngine) -> CombatResult<String> {
        let Some(scene_id) = self.scene.take() else {
            return Ok(NO_COMBAT.to_string());
        };
        let snapshot = engine.abort_scene(&scene_id)?;
        Ok(format!("You withdraw from the fight.\n\n{}", snapshot))
    }

    /// Submit an action for the active combatant, provided it belongs to the
    /// requester's side.
    fn act(
        &mut self,
        engine: &CombatEngine,
        build: impl FnOnce(CombatantId) -> ActionRequest,
    ) -> CombatResult<String> {
        let Some(scene_id) = self.scene.clone() else {
            return Ok(NO_COMBAT.to_string());
        };
        let snapshot = engine.get_snapshot(&scene_id)?;
        let (Some(actor), Some(name)) = (snapshot.active_id.as_deref(), snapshot.active.as_deref()) else {
            return Ok("Nobody is up to act.".to_string());
        };
        if !is_friendly(&snapshot, actor) {
            return Ok(format!("It is {}'s turn. Use 'ai' to let the enemies act.", name));
        }

        let outcome = engine.submit_action(&scene_id, build(CombatantId::from(actor)))?;
        self.follow(&outcome);
        Ok(render_outcome(&outcome))
    }

    fn follow(&mut self, outcome: &ActionOutcome) {
        if outcome.termination.is_some() {
            self.scene = None;
        }
    }
}

fn is_friendly(snapshot: &Snapshot, id: &str) -> bool {
    snapshot
        .friendly_frontline
        .iter()
        .chain(&snapshot.friendly_backline)
        .any(|view| view.id == id)
}

/// Event lines of one outcome, followed by the result of the fight or the
/// battlefield as it now stands.
pub fn render_outcome(outcome: &ActionOutcome) -> String {
    if let Some(rejection) = outcome.rejection() {
        return format!("Rejected: {}.", rejection);
    }

    let mut output = String::new();
    for message in &outcome.messages {
        output.push_str(message);
        output.push('\n');
    }
    output.push('\n');
    match outcome.termination {
        Some(Termination::EnemyWipe) => output.push_str(&format!(
            "Victory! Each survivor earns {} XP.\n",
            outcome.xp_awarded
        )),
        Some(Termination::FriendlyWipe) => output.push_str("Your party has fallen.\n"),
        None => output.push_str(&outcome.snapshot.to_string()),
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::CharacterStore;
    use crate::combat::rng::CombatRng;
    use crate::combat::tests::common::{sample_character, test_engine};
    use crate::party::StaticParties;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(
            parse_command("attack enemy_0_goblin"),
            Ok(Command::Attack {
                target: "enemy_0_goblin".to_string()
            })
        );
        assert_eq!(parse_command("  END "), Ok(Command::End));
        assert_eq!(parse_command("formation back"), Ok(Command::Formation(Line::Backline)));
        assert_eq!(
            parse_command("start goblin pair"),
            Ok(Command::Start {
                encounter: Some("goblin pair".to_string())
            })
        );
        assert!(parse_command("attack").is_err());
        assert!(parse_command("formation sideways").is_err());
        assert!(parse_command("dance").is_err());
        assert!(parse_command("").is_err());
    }

    #[test]
    fn test_parse_multi_word_abilities() {
        assert_eq!(
            parse_command("ability second wind"),
            Ok(Command::Ability {
                name: "second wind".to_string(),
                target: None
            })
        );
        assert_eq!(
            parse_command("use rend enemy_1_goblin"),
            Ok(Command::Ability {
                name: "rend".to_string(),
                target: Some("enemy_1_goblin".to_string())
            })
        );
    }

    #[test]
    fn test_session_plays_a_short_fight() {
        // brute hp, initiative x2, player to-hit + damage, brute target + to-hit + damage
        let fixture = test_engine(
            vec![sample_character("1", "Aldric")],
            StaticParties::new(),
            CombatRng::new_for_test(vec![30, 5, 5, 10, 4, 0, 10, 3]),
        );
        let engine = &fixture.engine;
        let mut session = Session::new("1");

        assert_eq!(session.execute(engine, Command::Show).unwrap(), NO_COMBAT);

        let opening = session
            .execute(engine, Command::Start { encounter: Some("brute".to_string()) })
            .unwrap();
        assert!(opening.contains("Brute 30/30"));
        assert!(session.scene().is_some());

        let attack = session
            .execute(engine, Command::Attack { target: "enemy_0_brute".to_string() })
            .unwrap();
        assert!(attack.contains("Aldric attacks Brute"));
        assert!(attack.contains("Brute 26/30"));

        let blocked = session.execute(engine, Command::End).unwrap();
        assert_eq!(blocked, "It is Brute's turn. Use 'ai' to let the enemies act.");

        let enemy = session.execute(engine, Command::Ai).unwrap();
        assert!(enemy.contains("Brute attacks Aldric"));

        let withdrawn = session.execute(engine, Command::Abort).unwrap();
        assert!(withdrawn.contains("Abandoned"));
        assert_eq!(session.scene(), None);
        assert_eq!(fixture.characters.get("1").unwrap().unwrap().current_hp, 97);
    }

    #[test]
    fn test_formation_command_updates_the_character() {
        let fixture = test_engine(
            vec![sample_character("1", "Aldric")],
            StaticParties::new(),
            CombatRng::new_for_test(vec![]),
        );
        let mut session = Session::new("1");
        session
            .execute(&fixture.engine, Command::Formation(Line::Backline))
            .unwrap();
        assert_eq!(
            fixture.characters.get("1").unwrap().unwrap().formation,
            Line::Backline
        );
    }
}
