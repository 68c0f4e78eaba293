//! Skirmish command line driver.
//!
//! Usage: `skirmish <character-id> [config.ron]`
//!
//! Reads one command per line from stdin and plays the fight on behalf of the
//! given character and their party. Logs go to stderr; set `RUST_LOG` to tune.

use skirmish::interface::{parse_command, Session, HELP};
use skirmish::{CombatEngine, CombatantId, EngineConfig};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skirmish=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(requester) = args.next() else {
        eprintln!("Usage: skirmish <character-id> [config.ron]");
        std::process::exit(2);
    };
    let config_path = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("skirmish.ron"));

    let config = match EngineConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading config {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };
    let engine = match CombatEngine::open(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error starting the combat engine: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = Session::new(requester);
    resume_existing(&engine, &mut session);

    println!("{}", HELP);
    if let Err(e) = run(&engine, &mut session) {
        eprintln!("Error on the terminal: {}", e);
        std::process::exit(1);
    }
}

/// Read and execute commands until end of input or `quit`.
fn run(engine: &CombatEngine, session: &mut Session) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "quit" | "exit" | "q") {
            return Ok(());
        }

        match parse_command(input) {
            Ok(command) => match session.execute(engine, command) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("Error: {}", e),
            },
            Err(message) => println!("{}", message),
        }
    }
}

/// Reattach to a scene left running by an earlier process, if the requester
/// is still fighting in one.
fn resume_existing(engine: &CombatEngine, session: &mut Session) {
    let report = match engine.recover() {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "could not read active scenes");
            return;
        }
    };
    let requester = CombatantId::from(session.requester());
    for scene_id in report.healthy {
        let Ok(scene) = engine.checked_scene(&scene_id) else {
            continue;
        };
        if scene.is_alive(&requester) {
            tracing::info!(scene = %scene_id, "resuming combat in progress");
            session.resume(scene_id);
            return;
        }
    }
}
