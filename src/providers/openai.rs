//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{check_http_response, GenerationClient, GenerationError};

/// Default endpoint when none is configured.
pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Chat completions request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
}

/// A message in chat completions format.
#[doc(hidden)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role (`system`, `user`, `assistant`).
    pub role: String,
    /// Message text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completions response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Response choices.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Error object some compatible servers return with a 200 status.
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// A response choice.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// Assistant message for this choice.
    pub message: ChatMessage,
}

/// Error payload.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ApiError {
    /// Human-readable error message.
    pub message: String,
    /// Provider-specific error type.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build a chat completions request.
#[doc(hidden)]
pub fn build_request(model: &str, system_prompt: Option<&str>, user_prompt: &str) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(ChatMessage {
            role: "system".to_owned(),
            content: Some(system.to_owned()),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_owned(),
        content: Some(user_prompt.to_owned()),
    });
    ChatRequest {
        model: model.to_owned(),
        messages,
    }
}

/// Extract the generated text from a response body.
///
/// # Errors
///
/// Returns [`GenerationError::RequestFailed`] if the body cannot be parsed or
/// carries an error object, and [`GenerationError::EmptyResponse`] if there
/// is no choice or the first choice has no text.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<String, GenerationError> {
    let resp: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::RequestFailed(format!("malformed response: {e}")))?;

    if let Some(err) = resp.error {
        return Err(GenerationError::RequestFailed(err.message));
    }

    let text = resp
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(GenerationError::EmptyResponse)?;

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatClient {
    /// Create a client. Requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::RequestFailed`] if the HTTP client cannot
    /// be built.
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_url,
            api_key,
            model,
            client,
        })
    }
}

#[async_trait::async_trait]
impl GenerationClient for OpenAiCompatClient {
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        let body = build_request(&self.model, system_prompt, user_prompt);
        debug!(
            model = %self.model,
            system_chars = system_prompt.map_or(0, |s| s.chars().count()),
            "generation request"
        );

        let mut request = self
            .client
            .post(&self.api_url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.header("authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let payload = check_http_response(response).await?;
        parse_response(&payload)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
