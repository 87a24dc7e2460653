use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::engine::apply_directive::SpawnPolicy;
use crate::engine::compactor::{DEFAULT_WINDOW_CAP, DEFAULT_WINDOW_TAIL};
use crate::model::journal::DEFAULT_JOURNAL_CAP;

const APP_DIR: &str = "legend-engine";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key, if any.
    pub api_key_env: String,
}

impl Default for NarratorSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234/v1".into(),
            model: "local-model".into(),
            temperature: 0.7,
            timeout_secs: 120,
            api_key_env: "LEGEND_NARRATOR_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IllustratorSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub api_key_env: String,
}

impl Default for IllustratorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://gen.pollinations.ai/image".into(),
            model: "flux".into(),
            width: 1024,
            height: 1024,
            api_key_env: "POLLINATIONS_API_KEY".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub narrator: NarratorSettings,
    pub illustrator: IllustratorSettings,
    pub window_cap: usize,
    pub window_tail: usize,
    pub journal_cap: usize,
    /// Journal entries quoted in each narrator prompt.
    pub prompt_journal_lines: usize,
    pub spawn_policy: SpawnPolicy,
    pub save_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            narrator: NarratorSettings::default(),
            illustrator: IllustratorSettings::default(),
            window_cap: DEFAULT_WINDOW_CAP,
            window_tail: DEFAULT_WINDOW_TAIL,
            journal_cap: DEFAULT_JOURNAL_CAP,
            prompt_journal_lines: 10,
            spawn_policy: SpawnPolicy::default(),
            save_dir: default_save_dir(),
        }
    }
}

fn default_save_dir() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("saves");
    path
}

pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push("settings.json");
    path
}

impl Settings {
    /// Loads from the user config dir, falling back to defaults, then applies
    /// environment overrides.
    pub fn load() -> Self {
        let path = settings_path();
        let mut settings = match Self::read_from(&path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings
    }

    pub fn read_from(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.write_to(&settings_path())
    }

    pub fn write_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("LEGEND_NARRATOR_URL") {
            self.narrator.base_url = url;
        }
        if let Some(model) = var("LEGEND_NARRATOR_MODEL") {
            self.narrator.model = model;
        }
    }
}
