use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::engine::apply_directive::{apply_directives, SpawnPolicy};
use crate::engine::compactor::{CompactionOutcome, ContextCompactor};
use crate::engine::directive_parser::parse_reply;
use crate::engine::llm_client::{AdapterError, Illustrator, Narrator};
use crate::engine::prompt_builder::PromptBuilder;
use crate::engine::protocol::{EngineCommand, EngineResponse};
use crate::engine::quick_actions::{self, QuickAction};
use crate::model::event_result::{NarrativeApplyReport, RejectReason};
use crate::model::game_save::{save_path, GameSave, SaveError};
use crate::model::game_state::{GameStateSnapshot, SessionState};
use crate::model::message::Turn;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("narrator unavailable: {0}")]
    Narrator(#[source] AdapterError),
    #[error("action rejected: {}", .0.message())]
    ActionRejected(RejectReason),
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// Everything the host needs to display after one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Narration with every directive token removed.
    pub narration: String,
    pub image: Option<String>,
    /// Dice line of the quick action that started the turn, if any.
    pub roll_summary: Option<String>,
    pub report: NarrativeApplyReport,
    pub compaction: CompactionOutcome,
    pub snapshot: GameStateSnapshot,
}

/// Owns the session and runs turns against the narrator.
///
/// A turn is all-or-nothing: it works on a copy of the session and only
/// commits once the narrator has replied.
pub struct Engine {
    state: SessionState,
    narrator: Box<dyn Narrator + Send>,
    illustrator: Option<Box<dyn Illustrator + Send>>,
    compactor: ContextCompactor,
    spawn_policy: SpawnPolicy,
    journal_lines: usize,
    save_dir: PathBuf,
    rng: StdRng,
}

impl Engine {
    pub fn new(
        mut state: SessionState,
        settings: &Settings,
        narrator: Box<dyn Narrator + Send>,
        illustrator: Option<Box<dyn Illustrator + Send>>,
    ) -> Self {
        state.journal.set_cap(settings.journal_cap);
        Self {
            state,
            narrator,
            illustrator,
            compactor: ContextCompactor::new(settings.window_cap, settings.window_tail),
            spawn_policy: settings.spawn_policy,
            journal_lines: settings.prompt_journal_lines,
            save_dir: settings.save_dir.clone(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixes the dice for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> GameStateSnapshot {
        GameStateSnapshot::from(&self.state)
    }

    pub fn begin_adventure(&mut self) -> Result<TurnOutcome, EngineError> {
        let prompt = PromptBuilder::intro(&self.state.character);
        self.play(self.state.clone(), prompt, None, None)
    }

    pub fn take_turn(&mut self, input: &str) -> Result<TurnOutcome, EngineError> {
        let prompt = PromptBuilder::build(&self.state, self.journal_lines, input);
        self.play(self.state.clone(), prompt, Some(input), None)
    }

    /// Resolves the action's dice locally, then plays its action string as a turn.
    pub fn perform(&mut self, action: &QuickAction) -> Result<TurnOutcome, EngineError> {
        let mut working = self.state.clone();
        let result = quick_actions::perform(&mut working, action, &mut self.rng)
            .map_err(EngineError::ActionRejected)?;
        let prompt = PromptBuilder::build(&working, self.journal_lines, &result.action_text);
        self.play(working, prompt, Some(&result.action_text), Some(result.roll_summary))
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, EngineError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => save_path(&self.save_dir, &self.state.character.name),
        };
        GameSave::new(self.state.clone()).write_to(&path)?;
        Ok(path)
    }

    fn play(
        &mut self,
        mut working: SessionState,
        prompt: String,
        player_input: Option<&str>,
        roll_summary: Option<String>,
    ) -> Result<TurnOutcome, EngineError> {
        let reply = self.narrator.generate(&prompt).map_err(|e| {
            warn!(error = %e, "narrator call failed, turn discarded");
            EngineError::Narrator(e)
        })?;

        let parsed = parse_reply(&reply);
        let mut report = apply_directives(
            &mut working,
            &parsed.directives,
            self.spawn_policy,
            &mut self.rng,
        );
        report.skipped = parsed.skipped.clone();

        let image = report.scene.as_deref().and_then(|scene| {
            let url = self.illustrate(scene, "scene")?;
            working.add_to_gallery(&url, scene);
            Some(url)
        });

        let narration = parsed.cleaned().trim().to_string();

        let mut compaction = CompactionOutcome::Accumulated;
        let mut turns = Vec::with_capacity(2);
        if let Some(input) = player_input {
            turns.push(Turn::player(input));
        }
        turns.push(Turn::narrator(narration.clone()).with_image(image.clone()));
        for turn in turns {
            let outcome = self
                .compactor
                .push(&mut working.history, turn, self.narrator.as_ref());
            if outcome != CompactionOutcome::Accumulated {
                compaction = outcome;
            }
        }

        debug!(
            applied = report.applied().count(),
            skipped = report.skipped.len(),
            image = image.is_some(),
            "turn complete"
        );

        self.state = working;
        Ok(TurnOutcome {
            narration,
            image,
            roll_summary,
            report,
            compaction,
            snapshot: self.snapshot(),
        })
    }

    /// Illustration is advisory: failures are logged and the turn goes on.
    fn illustrate(&self, description: &str, category: &str) -> Option<String> {
        let illustrator = self.illustrator.as_ref()?;
        match illustrator.render(description, category) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, category, "illustration failed");
                None
            }
        }
    }

    /// Serves commands until `Shutdown` or until either channel closes.
    pub fn run(&mut self, rx: Receiver<EngineCommand>, tx: Sender<EngineResponse>) {
        while let Ok(cmd) = rx.recv() {
            let response = match cmd {
                EngineCommand::BeginAdventure => self.turn_response(Self::begin_adventure),
                EngineCommand::PlayerInput(text) => {
                    self.turn_response(|engine| engine.take_turn(&text))
                }
                EngineCommand::QuickAction(action) => {
                    self.turn_response(|engine| engine.perform(&action))
                }
                EngineCommand::Save(path) => match self.save(path.as_deref()) {
                    Ok(path) => EngineResponse::Saved(path),
                    Err(e) => EngineResponse::SaveFailed {
                        error: e.to_string(),
                    },
                },
                EngineCommand::Snapshot => EngineResponse::Snapshot(self.snapshot()),
                EngineCommand::Shutdown => {
                    info!("engine shutting down");
                    break;
                }
            };

            if tx.send(response).is_err() {
                break;
            }
        }
    }

    fn turn_response(
        &mut self,
        turn: impl FnOnce(&mut Self) -> Result<TurnOutcome, EngineError>,
    ) -> EngineResponse {
        match turn(self) {
            Ok(outcome) => EngineResponse::TurnCompleted(Box::new(outcome)),
            Err(EngineError::ActionRejected(reason)) => EngineResponse::ActionRejected {
                notice: reason.message(),
            },
            Err(e) => EngineResponse::TurnFailed {
                error: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::character::{AbilityScores, Character, CharacterClass, Race};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        replies: Arc<Mutex<Vec<Result<String, String>>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Narrator for Scripted {
        fn generate(&self, prompt: &str) -> Result<String, AdapterError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Ok("Nothing happens.".to_string());
            }
            replies.remove(0).map_err(AdapterError::Unavailable)
        }
    }

    fn engine(replies: Vec<Result<String, String>>) -> (Engine, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let narrator = Scripted {
            replies: Arc::new(Mutex::new(replies)),
            prompts: prompts.clone(),
        };
        let character = Character::new("Brom", Race::Dwarf, CharacterClass::Fighter, AbilityScores::default());
        let engine = Engine::new(
            SessionState::new(character),
            &Settings::default(),
            Box::new(narrator),
            None,
        )
        .with_seed(1);
        (engine, prompts)
    }

    #[test]
    fn test_turn_applies_and_records() {
        let (mut engine, prompts) = engine(vec![Ok("You find coins. [[ORO:15]] [[XP:50]]".to_string())]);
        let outcome = engine.take_turn("I search the chest").unwrap();

        assert_eq!(outcome.narration, "You find coins.");
        assert_eq!(outcome.snapshot.gold, 25);
        assert_eq!(outcome.snapshot.xp, 50);
        assert!(prompts.lock().unwrap()[0].contains("I search the chest"));

        let window = &engine.state().history.window;
        assert_eq!(window.len(), 2);
        assert_eq!(window[0], Turn::player("I search the chest"));
        assert_eq!(window[1].text, "You find coins.");
    }

    #[test]
    fn test_failed_turn_changes_nothing() {
        let (mut engine, _) = engine(vec![Err("quota".to_string())]);
        let before = engine.state().clone();
        let err = engine.perform(&QuickAction::ShortRest).unwrap_err();
        assert!(matches!(err, EngineError::Narrator(_)));
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn test_rejected_action_skips_narrator() {
        let (mut engine, prompts) = engine(vec![]);
        engine.perform(&QuickAction::ShortRest).unwrap();
        let err = engine.perform(&QuickAction::ShortRest).unwrap_err();
        assert!(matches!(err, EngineError::ActionRejected(ref r) if r.is_resource_exhausted()));
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_run_loop_round_trip() {
        let (mut engine, _) = engine(vec![Ok("A goblin leaps out! [[NEMICO:Goblin|7|13]]".to_string())]);
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();

        cmd_tx.send(EngineCommand::PlayerInput("I open the door".into())).unwrap();
        cmd_tx.send(EngineCommand::Snapshot).unwrap();
        cmd_tx.send(EngineCommand::Shutdown).unwrap();
        engine.run(cmd_rx, resp_tx);

        match resp_rx.recv().unwrap() {
            EngineResponse::TurnCompleted(outcome) => {
                assert_eq!(outcome.snapshot.foe.as_ref().map(|f| f.name.as_str()), Some("Goblin"));
            }
            _ => panic!("expected a completed turn"),
        }
        assert!(matches!(resp_rx.recv().unwrap(), EngineResponse::Snapshot(_)));
        assert!(resp_rx.recv().is_err());
    }
}
