//! Enrichment provider contract and OpenAI client
//!
//! The provider turns a dish name into an ordered ingredient list. The
//! OpenAI client asks a chat model for one ingredient per line; a reply
//! matching one of the unknown-dish phrases is surfaced as the
//! distinguished `UnknownDish` error rather than an ingredient list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// OpenAI chat completions base URL
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default timeout for enrichment API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Sampling temperature for ingredient listings
const TEMPERATURE: f32 = 0.7;

/// Reply phrases that signal the model does not know the dish
const UNKNOWN_DISH_PHRASES: &[&str] = &[
    "I'm not sure",
    "I don't have information",
    "I'm not familiar with",
    "I don't know",
    "Unable to provide ingredients",
    "not a recognized dish",
    "doesn't appear to be a specific dish",
    "I don't have enough information",
    "It's unclear what dish you're referring to",
    "I'm sorry, but I can't provide information",
];

const SYSTEM_PROMPT: &str = "You are a helpful assistant that lists ingredients. Provide only \
    the ingredient names, one per line. Do not include measurements, \
    numbers, or any other text. If you do not know the dish, say so directly.";

/// Enrichment failures
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Provider signaled that the dish is not recognized
    #[error("Unknown dish: {0}")]
    UnknownDish(String),

    /// Provider answered with an error
    #[error("Enrichment API error: {0}")]
    Api(String),

    /// Network-level failure reaching the provider
    #[error("Enrichment transport error: {0}")]
    Transport(String),

    /// Provider call exceeded the configured deadline
    #[error("Enrichment timed out for dish: {0}")]
    Timeout(String),

    /// Provider answered successfully but with no usable ingredients
    #[error("Enrichment returned no ingredients for dish: {0}")]
    Empty(String),
}

/// Enrichment provider contract consumed by the worker
#[async_trait]
pub trait IngredientProvider: Send + Sync {
    /// Fetch the ordered ingredient list for a dish
    async fn fetch_ingredients(&self, dish_name: &str) -> Result<Vec<String>, EnrichmentError>;
}

/// OpenAI-backed ingredient provider
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, OPENAI_API_URL)
    }

    /// Create a client against a non-default endpoint (used by tests)
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    fn request_body(&self, dish_name: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "List the ingredients in {}, providing only the ingredient names:",
                        dish_name
                    ),
                },
            ],
            temperature: TEMPERATURE,
        }
    }
}

#[async_trait]
impl IngredientProvider for OpenAiClient {
    async fn fetch_ingredients(&self, dish_name: &str) -> Result<Vec<String>, EnrichmentError> {
        let response = self
            .http_client
            .post(&self.base_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&self.request_body(dish_name))
            .send()
            .await
            .map_err(|e| EnrichmentError::Transport(format!("Chat request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EnrichmentError::Api(format!(
                "Chat returned {}: {}",
                status, message
            )));
        }

        let body = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| EnrichmentError::Transport(format!("Chat response parse: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EnrichmentError::Api("Chat response had no choices".to_string()))?;

        debug!(dish_name, "Enrichment reply received");
        parse_ingredients(&content, dish_name)
    }
}

/// Turn a chat reply into an ordered ingredient list
///
/// Replies matching an unknown-dish phrase are errors; otherwise the reply
/// is split into lines, list bullets are stripped, and blank lines dropped.
pub fn parse_ingredients(content: &str, dish_name: &str) -> Result<Vec<String>, EnrichmentError> {
    let lowered = content.to_lowercase();
    if UNKNOWN_DISH_PHRASES
        .iter()
        .any(|phrase| lowered.contains(&phrase.to_lowercase()))
    {
        return Err(EnrichmentError::UnknownDish(dish_name.to_string()));
    }

    let ingredients: Vec<String> = content
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if ingredients.is_empty() {
        return Err(EnrichmentError::Empty(dish_name.to_string()));
    }

    Ok(ingredients)
}

/// Scripted in-memory provider for tests and local runs
///
/// Knows the dishes it was given and signals `UnknownDish` for anything
/// else, mirroring the production provider's contract.
#[derive(Default)]
pub struct ScriptedProvider {
    known: HashMap<String, Vec<String>>,
    fail_all: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dish the provider recognizes
    pub fn insert(mut self, dish_name: impl Into<String>, ingredients: Vec<&str>) -> Self {
        self.known.insert(
            dish_name.into(),
            ingredients.into_iter().map(str::to_string).collect(),
        );
        self
    }

    /// Delay every fetch, for exercising timeout handling
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every fetch fail with an API error
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Number of fetch calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngredientProvider for ScriptedProvider {
    async fn fetch_ingredients(&self, dish_name: &str) -> Result<Vec<String>, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(EnrichmentError::Api(
                "Provider unavailable (injected failure)".to_string(),
            ));
        }

        self.known
            .get(dish_name)
            .cloned()
            .ok_or_else(|| EnrichmentError::UnknownDish(dish_name.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_lines_become_ordered_ingredients() {
        let reply = "Spaghetti\nEggs\nPancetta\nParmesan";
        let ingredients = parse_ingredients(reply, "Spaghetti Carbonara").unwrap();
        assert_eq!(ingredients, vec!["Spaghetti", "Eggs", "Pancetta", "Parmesan"]);
    }

    #[test]
    fn bullets_and_blank_lines_are_stripped() {
        let reply = "- Noodles\n\n* Broth\n  • Scallions  \n";
        let ingredients = parse_ingredients(reply, "Ramen").unwrap();
        assert_eq!(ingredients, vec!["Noodles", "Broth", "Scallions"]);
    }

    #[test]
    fn unknown_dish_phrases_are_distinguished() {
        let reply = "I'm sorry, but I'm not familiar with that dish.";
        let err = parse_ingredients(reply, "Zzznonexistent").unwrap_err();
        assert!(matches!(err, EnrichmentError::UnknownDish(name) if name == "Zzznonexistent"));
    }

    #[test]
    fn phrase_matching_is_case_insensitive() {
        let reply = "i DON'T KNOW what that is.";
        assert!(matches!(
            parse_ingredients(reply, "Mystery").unwrap_err(),
            EnrichmentError::UnknownDish(_)
        ));
    }

    #[test]
    fn empty_reply_is_an_error() {
        assert!(matches!(
            parse_ingredients("\n  \n", "Pho").unwrap_err(),
            EnrichmentError::Empty(_)
        ));
    }

    #[test]
    fn chat_response_deserializes() {
        let json = r#"{
            "choices": [{"message": {"role": "assistant", "content": "Rice\nFish"}}]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, "Rice\nFish");
    }

    #[tokio::test]
    async fn scripted_provider_signals_unknown_dishes() {
        let provider = ScriptedProvider::new().insert("Ramen", vec!["Noodles", "Broth"]);

        let known = provider.fetch_ingredients("Ramen").await.unwrap();
        assert_eq!(known, vec!["Noodles", "Broth"]);

        let err = provider.fetch_ingredients("Zzznonexistent").await.unwrap_err();
        assert!(matches!(err, EnrichmentError::UnknownDish(_)));
        assert_eq!(provider.call_count(), 2);
    }
}
