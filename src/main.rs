use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legend_engine::config::Settings;
use legend_engine::engine::engine::Engine;
use legend_engine::engine::llm_client::{HttpNarrator, Illustrator, UrlIllustrator};
use legend_engine::engine::protocol::{EngineCommand, EngineResponse};
use legend_engine::engine::quick_actions::QuickAction;
use legend_engine::model::character::{Ability, AbilityScores, Character, CharacterClass, Race, Skill};
use legend_engine::model::game_save::GameSave;
use legend_engine::model::game_state::{GameStateSnapshot, SessionState};

const HELP: &str = "\
Commands:
  /roll                 roll a d20
  /attack [weapon]      attack with a carried weapon
  /skill <name>         skill check, e.g. /skill stealth
  /cast <spell> [level] cast a known spell
  /rest short|long      take a rest
  /save [path]          save the adventure
  /status               show the character sheet
  /quit                 leave
Anything else is sent to the narrator as your action.";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,legend_engine=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let settings = Settings::load();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let (state, fresh) = match std::env::args().nth(1) {
        Some(path) => {
            let save = GameSave::read_from(Path::new(&path))
                .with_context(|| format!("loading save {}", path))?;
            (save.state, false)
        }
        None => (SessionState::new(create_character(&mut lines)?), true),
    };

    let narrator = HttpNarrator::new(settings.narrator.clone()).context("building narrator client")?;
    match narrator.test_connection() {
        Ok(status) => info!(url = %settings.narrator.base_url, "{}", status),
        Err(e) => warn!(url = %settings.narrator.base_url, error = %e, "narrator not reachable yet"),
    }
    let illustrator = settings.illustrator.enabled.then(|| {
        Box::new(UrlIllustrator::new(settings.illustrator.clone())) as Box<dyn Illustrator + Send>
    });
    let mut engine = Engine::new(state, &settings, Box::new(narrator), illustrator);

    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let worker = thread::spawn(move || engine.run(cmd_rx, resp_tx));

    if fresh {
        cmd_tx.send(EngineCommand::BeginAdventure)?;
        print_response(&resp_rx)?;
    } else {
        cmd_tx.send(EngineCommand::Snapshot)?;
        print_response(&resp_rx)?;
    }

    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match parse_command(line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => break,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };
        cmd_tx.send(cmd)?;
        print_response(&resp_rx)?;
    }

    cmd_tx.send(EngineCommand::Shutdown)?;
    if worker.join().is_err() {
        bail!("engine thread panicked");
    }
    Ok(())
}

/// `Ok(None)` means quit.
fn parse_command(line: &str) -> Result<Option<EngineCommand>, String> {
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(EngineCommand::PlayerInput(line.to_string())));
    };
    let (name, arg) = match rest.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let action = match name.to_lowercase().as_str() {
        "quit" | "exit" => return Ok(None),
        "help" => return Err(HELP.to_string()),
        "status" => return Ok(Some(EngineCommand::Snapshot)),
        "save" => {
            let path = (!arg.is_empty()).then(|| PathBuf::from(arg));
            return Ok(Some(EngineCommand::Save(path)));
        }
        "roll" => QuickAction::RollD20,
        "attack" => QuickAction::Attack {
            weapon: (!arg.is_empty()).then(|| arg.to_string()),
        },
        "skill" => {
            let skill = Skill::from_name(arg).ok_or_else(|| format!("unknown skill '{}'", arg))?;
            QuickAction::SkillCheck { skill }
        }
        "rest" => match arg.to_lowercase().as_str() {
            "short" => QuickAction::ShortRest,
            "long" => QuickAction::LongRest,
            _ => return Err("usage: /rest short|long".to_string()),
        },
        "cast" => {
            if arg.is_empty() {
                return Err("usage: /cast <spell> [level]".to_string());
            }
            match arg.rsplit_once(' ') {
                Some((spell, level)) if level.parse::<u8>().is_ok() => QuickAction::CastSpell {
                    spell: spell.trim().to_string(),
                    slot_level: level.parse().ok(),
                },
                _ => QuickAction::CastSpell {
                    spell: arg.to_string(),
                    slot_level: None,
                },
            }
        }
        other => return Err(format!("unknown command /{} (try /help)", other)),
    };
    Ok(Some(EngineCommand::QuickAction(action)))
}

fn print_response(rx: &Receiver<EngineResponse>) -> Result<()> {
    match rx.recv()? {
        EngineResponse::TurnCompleted(outcome) => {
            if let Some(roll) = &outcome.roll_summary {
                println!("[{}]", roll);
            }
            println!("\n{}\n", outcome.narration);
            if let Some(url) = &outcome.image {
                println!("(image) {}", url);
            }
            for level in &outcome.report.levels_gained {
                println!("* Level up! You are now level {}.", level);
            }
            if let Some(foe) = &outcome.report.foe_defeated {
                println!("* {} is defeated.", foe);
            }
            for notice in outcome.report.notices() {
                println!("! {}", notice);
            }
            print_status(&outcome.snapshot);
        }
        EngineResponse::ActionRejected { notice } => println!("! {}", notice),
        EngineResponse::TurnFailed { error } => {
            println!("The narrator is silent ({}). Nothing changed; try again.", error)
        }
        EngineResponse::Saved(path) => println!("Saved to {}", path.display()),
        EngineResponse::SaveFailed { error } => println!("Save failed: {}", error),
        EngineResponse::Snapshot(snapshot) => print_status(&snapshot),
    }
    Ok(())
}

fn print_status(s: &GameStateSnapshot) {
    let next = s
        .next_level_xp
        .map(|xp| format!("/{}", xp))
        .unwrap_or_default();
    println!(
        "{} | {} {} L{} | HP {}/{} | AC {} | XP {}{} | Gold {}",
        s.name, s.race, s.class, s.level, s.hp, s.hp_max, s.armor_class, s.xp, next, s.gold
    );
    if !s.spell_slots.is_empty() {
        let slots: Vec<String> = s
            .spell_slots
            .iter()
            .map(|(lvl, left, max)| format!("L{} {}/{}", lvl, left, max))
            .collect();
        println!("Slots: {}", slots.join(", "));
    }
    if let Some(foe) = &s.foe {
        println!("Enemy: {}", foe.summary());
    }
}

fn create_character(lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<Character> {
    let name = ask(lines, "Character name")?;
    let name = if name.is_empty() { "Adventurer".to_string() } else { name };

    let race = loop {
        let answer = ask(lines, "Race (human, elf, dwarf, tiefling, half-elf)")?;
        if let Some(race) = parse_race(&answer) {
            break race;
        }
        println!("Unknown race '{}'.", answer);
    };

    let class = loop {
        let answer = ask(lines, "Class (fighter, wizard, rogue, ranger, cleric)")?;
        if let Some(class) = parse_class(&answer) {
            break class;
        }
        println!("Unknown class '{}'.", answer);
    };

    let scores = AbilityScores::roll(&mut rand::thread_rng());
    let rolled: Vec<String> = Ability::ALL
        .iter()
        .map(|a| format!("{} {}", a.abbreviation(), scores.get(*a)))
        .collect();
    println!("Rolled {}", rolled.join(" "));
    Ok(Character::new(name, race, class, scores))
}

fn ask(lines: &mut impl Iterator<Item = io::Result<String>>, prompt: &str) -> Result<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(line?.trim().to_string()),
        None => bail!("input closed during character creation"),
    }
}

fn parse_race(s: &str) -> Option<Race> {
    match s.trim().to_lowercase().as_str() {
        "human" => Some(Race::Human),
        "elf" => Some(Race::Elf),
        "dwarf" => Some(Race::Dwarf),
        "tiefling" => Some(Race::Tiefling),
        "half-elf" | "half elf" | "halfelf" => Some(Race::HalfElf),
        _ => None,
    }
}

fn parse_class(s: &str) -> Option<CharacterClass> {
    match s.trim().to_lowercase().as_str() {
        "fighter" => Some(CharacterClass::Fighter),
        "wizard" => Some(CharacterClass::Wizard),
        "rogue" => Some(CharacterClass::Rogue),
        "ranger" => Some(CharacterClass::Ranger),
        "cleric" => Some(CharacterClass::Cleric),
        _ => None,
    }
}
