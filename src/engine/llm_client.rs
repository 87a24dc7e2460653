use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{IllustratorSettings, NarratorSettings};

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned no choices")]
    EmptyResponse,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("missing description")]
    MissingDescription,
}

/// Turns an assembled prompt into narration that may embed directives.
pub trait Narrator {
    fn generate(&self, prompt: &str) -> Result<String, AdapterError>;
}

/// Turns a short description into a displayable image reference.
pub trait Illustrator {
    fn render(&self, description: &str, category: &str) -> Result<String, AdapterError>;
}

#[derive(Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub message: ChatMessageResponse,
}

#[derive(Deserialize)]
pub struct ChatMessageResponse {
    pub content: String,
}

/// Narrator backed by an OpenAI-compatible chat completions endpoint
/// (LM Studio, llama.cpp server, hosted APIs).
pub struct HttpNarrator {
    client: Client,
    settings: NarratorSettings,
    api_key: Option<String>,
}

impl HttpNarrator {
    pub fn new(settings: NarratorSettings) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let api_key = std::env::var(&settings.api_key_env).ok();
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    /// Lists the models the endpoint serves; used as a connectivity check.
    pub fn test_connection(&self) -> Result<String, AdapterError> {
        let url = format!("{}/models", self.settings.base_url.trim_end_matches('/'));
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp: serde_json::Value = request.send()?.error_for_status()?.json()?;

        Ok(format!(
            "Connected ({} models available)",
            resp["data"].as_array().map(|a| a.len()).unwrap_or(0)
        ))
    }
}

impl Narrator for HttpNarrator {
    fn generate(&self, prompt: &str) -> Result<String, AdapterError> {
        let req = ChatCompletionRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt.to_string(),
            }],
        };

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        debug!(%url, prompt_chars = prompt.len(), "calling narrator");

        let mut request = self.client.post(url).json(&req);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()?
            .error_for_status()?
            .json::<ChatCompletionResponse>()?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(AdapterError::EmptyResponse)
    }
}

/// Builds image-generation URLs; the image is fetched by whoever displays it.
pub struct UrlIllustrator {
    settings: IllustratorSettings,
    api_key: Option<String>,
}

impl UrlIllustrator {
    pub fn new(settings: IllustratorSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok();
        Self { settings, api_key }
    }

    pub fn build_url(&self, description: &str, category: &str, seed: u32) -> Result<Url, AdapterError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AdapterError::MissingDescription);
        }

        let prompt = format!(
            "Dungeons and Dragons realistic high fantasy, {}: {}, cinematic lighting, no text",
            category, description
        );

        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|e| AdapterError::InvalidUrl(format!("{}: {}", self.settings.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| AdapterError::InvalidUrl(self.settings.base_url.clone()))?
            .pop_if_empty()
            .push(&prompt);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &self.settings.width.to_string())
                .append_pair("height", &self.settings.height.to_string())
                .append_pair("seed", &seed.to_string())
                .append_pair("nologo", "true")
                .append_pair("model", &self.settings.model);
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }

        Ok(url)
    }
}

impl Illustrator for UrlIllustrator {
    fn render(&self, description: &str, category: &str) -> Result<String, AdapterError> {
        let seed = rand::thread_rng().gen_range(1..100_000);
        self.build_url(description, category, seed).map(String::from)
    }
}
