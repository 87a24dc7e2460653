use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Player,
    Narrator,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Player => "PLAYER",
            Speaker::Narrator => "NARRATOR",
        }
    }
}

/// One conversation turn. Narrator turns hold the cleaned narration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Turn {
    pub fn player(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Player,
            text: text.into(),
            image: None,
        }
    }

    pub fn narrator(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Narrator,
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    /// `SPEAKER: text`, the line format used in prompts and summaries.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.speaker.label(), self.text.trim())
    }
}

/// Two-tier conversation memory: recent turns verbatim plus summaries of
/// everything evicted from the window. The digest only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    pub window: Vec<Turn>,
    pub digest: Vec<String>,
}

impl History {
    pub fn last(&self) -> Option<&Turn> {
        self.window.last()
    }
}
