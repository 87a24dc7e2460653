//! Versioned save files.
//!
//! Older layouts are mapped onto the current schema once, in [`migrate`],
//! before deserialization. Nothing past the loader ever sees an old shape.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::game_state::SessionState;

pub const SAVE_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save io: {0}")]
    Io(#[from] std::io::Error),
    #[error("save json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported save version {0} (newest known is {newest})", newest = SAVE_VERSION)]
    UnsupportedVersion(u64),
    #[error("invalid save format: {0}")]
    InvalidFormat(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSave {
    pub version: u32,
    pub state: SessionState,
}

impl GameSave {
    pub fn new(state: SessionState) -> Self {
        Self {
            version: SAVE_VERSION,
            state,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SaveError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "game saved");
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, SaveError> {
        let text = fs::read_to_string(path)?;
        let save = Self::from_json(&text)?;
        info!(path = %path.display(), name = %save.state.character.name, "game loaded");
        Ok(save)
    }

    pub fn from_json(text: &str) -> Result<Self, SaveError> {
        let raw: Value = serde_json::from_str(text)?;
        let mut save: Self = serde_json::from_value(migrate(raw)?)?;
        enforce_invariants(&mut save.state);
        Ok(save)
    }
}

/// Hand-edited files can hold values the engine never produces.
fn enforce_invariants(state: &mut SessionState) {
    let c = &mut state.character;
    c.hp_max = c.hp_max.max(1);
    c.hp = c.hp.min(c.hp_max);
    c.hit_dice.current = c.hit_dice.current.min(c.hit_dice.max);
    c.spell_slots.clamp_used();

    let cap = state.journal.cap();
    state.journal.set_cap(cap);

    if state.foe.as_ref().is_some_and(|f| f.is_defeated()) {
        warn!("dropping defeated foe from save");
        state.foe = None;
    }
}

/// `<dir>/<name>.json` with the name reduced to a filesystem-safe slug.
pub fn save_path(dir: &Path, character_name: &str) -> PathBuf {
    let slug: String = character_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let slug = if slug.is_empty() { "adventure".to_string() } else { slug };
    dir.join(format!("{slug}.json"))
}

fn migrate(raw: Value) -> Result<Value, SaveError> {
    let Value::Object(mut root) = raw else {
        return Err(SaveError::InvalidFormat("top level is not an object"));
    };

    match root.get("version") {
        None => {
            info!("migrating version 1 save");
            let state = migrate_v1(root)?;
            Ok(json!({ "version": SAVE_VERSION, "state": state }))
        }
        Some(v) => match v.as_u64() {
            Some(2) => {
                root.insert("version".to_string(), json!(SAVE_VERSION));
                Ok(Value::Object(root))
            }
            Some(n) => Err(SaveError::UnsupportedVersion(n)),
            None => Err(SaveError::InvalidFormat("version is not a number")),
        },
    }
}

/// Version 1 kept the session record at the top level, stored the first-level
/// slot count as two integers (remaining and max) and kept the digest as one
/// newline-joined string.
fn migrate_v1(mut root: Map<String, Value>) -> Result<Value, SaveError> {
    let character = root
        .get_mut("character")
        .and_then(Value::as_object_mut)
        .ok_or(SaveError::InvalidFormat("missing character"))?;

    if let Some(remaining) = character.get("spell_slots").and_then(Value::as_u64) {
        let max = character
            .remove("spell_slots_max")
            .and_then(|v| v.as_u64())
            .unwrap_or(remaining);
        let used = max.saturating_sub(remaining);
        character.insert(
            "spell_slots".to_string(),
            json!({ "max": { "1": max }, "used": { "1": used } }),
        );
    }

    if let Some(history) = root.get_mut("history").and_then(Value::as_object_mut) {
        if let Some(Value::String(digest)) = history.get("digest") {
            let lines: Vec<String> = digest
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            history.insert("digest".to_string(), json!(lines));
        }
    }

    Ok(Value::Object(root))
}
