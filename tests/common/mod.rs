//! Scripted narrator and illustrator doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use legend_engine::config::Settings;
use legend_engine::engine::engine::Engine;
use legend_engine::engine::llm_client::{AdapterError, Illustrator, Narrator};
use legend_engine::model::character::{AbilityScores, Character, CharacterClass, Race};
use legend_engine::model::game_state::SessionState;

pub const SUMMARY_REPLY: &str = "The hero explored the ruins and met Mira the guide.";

/// Replies in order; summary requests are answered separately so they do not
/// consume the turn script.
#[derive(Clone, Default)]
pub struct ScriptedNarrator {
    replies: Arc<Mutex<VecDeque<Result<String, String>>>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub summaries: Arc<Mutex<usize>>,
}

impl ScriptedNarrator {
    pub fn new(replies: &[&str]) -> Self {
        let narrator = Self::default();
        for r in replies {
            narrator.push_ok(r);
        }
        narrator
    }

    pub fn push_ok(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_err(&self, reason: &str) {
        self.replies.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Narrator for ScriptedNarrator {
    fn generate(&self, prompt: &str) -> Result<String, AdapterError> {
        if prompt.starts_with("Summarise") {
            *self.summaries.lock().unwrap() += 1;
            return Ok(SUMMARY_REPLY.to_string());
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply.map_err(AdapterError::Unavailable),
            None => Ok("The wind howls.".to_string()),
        }
    }
}

pub struct EchoIllustrator;

impl Illustrator for EchoIllustrator {
    fn render(&self, description: &str, category: &str) -> Result<String, AdapterError> {
        Ok(format!("img://{}/{}", category, description))
    }
}

pub struct BrokenIllustrator;

impl Illustrator for BrokenIllustrator {
    fn render(&self, _description: &str, _category: &str) -> Result<String, AdapterError> {
        Err(AdapterError::Unavailable("quota exceeded".to_string()))
    }
}

pub fn hero(class: CharacterClass) -> SessionState {
    let scores = AbilityScores {
        strength: 15,
        dexterity: 14,
        constitution: 12,
        ..AbilityScores::default()
    };
    SessionState::new(Character::new("Brom", Race::Dwarf, class, scores))
}

pub fn engine_with(
    state: SessionState,
    settings: &Settings,
    narrator: &ScriptedNarrator,
    illustrator: Option<Box<dyn Illustrator + Send>>,
) -> Engine {
    Engine::new(state, settings, Box::new(narrator.clone()), illustrator).with_seed(42)
}
