//! Topic-to-presentation suggestions from a generative model.
//!
//! The service is optional: without an API key callers get a [`MissingSuggester`]
//! and should hide the affordance.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use shared::protocol::{SuggestedPresentation, SuggestedQuestion};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ClientSettings;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("suggestions are unavailable: no API key configured")]
    Unavailable,
    #[error("a suggestion is already being generated")]
    InFlight,
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("suggestion timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to generate presentation: {0}")]
    Generation(String),
}

#[async_trait]
pub trait Suggester: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    async fn suggest(&self, topic: &str) -> Result<SuggestedPresentation, SuggestionError>;
}

pub struct MissingSuggester;

#[async_trait]
impl Suggester for MissingSuggester {
    fn is_available(&self) -> bool {
        false
    }

    async fn suggest(&self, _topic: &str) -> Result<SuggestedPresentation, SuggestionError> {
        Err(SuggestionError::Unavailable)
    }
}

pub struct GeminiSuggester {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSuggester {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Picks the Gemini client when a key is configured, otherwise the missing one.
pub fn suggester_from_settings(settings: &ClientSettings) -> Arc<dyn Suggester> {
    match &settings.gemini_api_key {
        Some(key) => {
            info!(model = %settings.gemini_model, "presentation suggestions enabled");
            Arc::new(GeminiSuggester::new(key.clone(), settings.gemini_model.clone()))
        }
        None => {
            warn!("GEMINI_API_KEY not set; presentation suggestions are disabled");
            Arc::new(MissingSuggester)
        }
    }
}

fn prompt(topic: &str) -> String {
    format!(
        "Generate a fun and engaging presentation with multiple-choice poll questions about the \
         following topic: \"{topic}\". The presentation should have a title and between 2 and 5 \
         questions. Each question should have between 3 and 5 plausible options."
    )
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "A short, engaging title for the poll session, related to the topic."
            },
            "questions": {
                "type": "ARRAY",
                "description": "An array of 2-5 multiple-choice poll questions related to the topic.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "question": { "type": "STRING", "description": "The poll question." },
                        "options": {
                            "type": "ARRAY",
                            "description": "An array of 3-5 plausible options for the poll.",
                            "items": { "type": "STRING" }
                        }
                    },
                    "required": ["question", "options"]
                }
            }
        },
        "required": ["title", "questions"]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPresentation {
    title: Option<String>,
    #[serde(default)]
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: Option<String>,
    #[serde(default)]
    options: Vec<String>,
}

/// Validates the model's JSON payload and trims every text field.
pub fn parse_suggestion(text: &str) -> Result<SuggestedPresentation, SuggestionError> {
    let raw: RawPresentation = serde_json::from_str(text.trim())
        .map_err(|err| SuggestionError::Generation(format!("malformed response: {err}")))?;

    let title = raw
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or_else(|| SuggestionError::Generation("response has no title".into()))?;
    if raw.questions.is_empty() {
        return Err(SuggestionError::Generation(
            "response has no questions".into(),
        ));
    }

    let mut questions = Vec::with_capacity(raw.questions.len());
    for (index, question) in raw.questions.into_iter().enumerate() {
        let text = question
            .question
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                SuggestionError::Generation(format!("question {} has no text", index + 1))
            })?;
        let options: Vec<String> = question
            .options
            .into_iter()
            .map(|option| option.trim().to_string())
            .filter(|option| !option.is_empty())
            .collect();
        if options.is_empty() {
            return Err(SuggestionError::Generation(format!(
                "question {} has no options",
                index + 1
            )));
        }
        questions.push(SuggestedQuestion {
            question: text,
            options,
        });
    }

    Ok(SuggestedPresentation { title, questions })
}

#[async_trait]
impl Suggester for GeminiSuggester {
    async fn suggest(&self, topic: &str) -> Result<SuggestedPresentation, SuggestionError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt(topic) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|err| SuggestionError::Generation(err.to_string()))?;
        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| SuggestionError::Generation(err.to_string()))?;

        let text = envelope
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.text)
            .ok_or_else(|| SuggestionError::Generation("response has no text part".into()))?;
        parse_suggestion(&text)
    }
}

/// Serializes suggestion requests: one at a time, each bounded by a timeout.
pub struct SuggestionController {
    suggester: Arc<dyn Suggester>,
    in_flight: AtomicBool,
    timeout: Duration,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SuggestionController {
    pub fn new(suggester: Arc<dyn Suggester>, timeout: Duration) -> Self {
        Self {
            suggester,
            in_flight: AtomicBool::new(false),
            timeout,
        }
    }

    pub fn is_available(&self) -> bool {
        self.suggester.is_available()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn suggest(&self, topic: &str) -> Result<SuggestedPresentation, SuggestionError> {
        if !self.suggester.is_available() {
            return Err(SuggestionError::Unavailable);
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SuggestionError::EmptyTopic);
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(SuggestionError::InFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        match tokio::time::timeout(self.timeout, self.suggester.suggest(topic)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(topic, timeout = ?self.timeout, "suggestion timed out");
                Err(SuggestionError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/suggest_tests.rs"]
mod tests;
