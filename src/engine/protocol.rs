use std::path::PathBuf;

use crate::engine::engine::TurnOutcome;
use crate::engine::quick_actions::QuickAction;
use crate::model::game_state::GameStateSnapshot;

pub enum EngineCommand {
    /// Ask the narrator for the opening scene.
    BeginAdventure,
    PlayerInput(String),
    QuickAction(QuickAction),
    /// Save to the given path, or to the configured save directory.
    Save(Option<PathBuf>),
    Snapshot,
    Shutdown,
}

pub enum EngineResponse {
    TurnCompleted(Box<TurnOutcome>),

    /// A quick action was refused before reaching the narrator. Shown as a notice.
    ActionRejected {
        notice: String,
    },

    /// The narrator call failed; the session is unchanged.
    TurnFailed {
        error: String,
    },

    Saved(PathBuf),

    SaveFailed {
        error: String,
    },

    Snapshot(GameStateSnapshot),
}
