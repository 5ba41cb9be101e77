//! Text-generation client abstraction.
//!
//! Defines the [`GenerationClient`] trait used by the persona pipeline and
//! the HTTP helpers shared by implementations. One implementation ships:
//! [`openai::OpenAiCompatClient`], for any OpenAI-compatible
//! `/chat/completions` endpoint.
//!
//! Calls are single best-effort requests: no retries, no backoff.

use async_trait::async_trait;
use regex::Regex;

pub mod openai;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by generation clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Transport failure, non-success status, or an error payload.
    #[error("generation request failed: {0}")]
    RequestFailed(String),

    /// The service answered without any generated text.
    #[error("generation returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Longest error body carried in a [`GenerationError`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Credentials an endpoint may echo back in an error body.
const SECRET_PATTERNS: [&str; 3] = [
    r"sk-ant-[A-Za-z0-9_\-]{10,}",
    r"sk-[A-Za-z0-9_\-]{20,}",
    r"Bearer [A-Za-z0-9_\-\.]{10,}",
];

/// Return the body of a 2xx response.
///
/// # Errors
///
/// Returns [`GenerationError::RequestFailed`] on transport failure or a
/// non-2xx status. The error carries the status and a sanitized body.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, GenerationError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    Err(GenerationError::RequestFailed(format!(
        "status {}: {}",
        status.as_u16(),
        sanitize_http_error_body(&body)
    )))
}

/// Make an error body safe to log: collapse whitespace, redact key-like
/// tokens and cap the length.
pub fn sanitize_http_error_body(raw: &str) -> String {
    let mut text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for secret in SECRET_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()) {
        text = secret.replace_all(&text, "[REDACTED]").into_owned();
    }
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...[truncated]", &text[..cut]),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A request/response text-generation service.
///
/// Implementations must be `Send + Sync` so one client can be shared by
/// every concurrently running handler.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate text for `user_prompt`, optionally preceded by a system prompt.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::RequestFailed`] if the call fails and
    /// [`GenerationError::EmptyResponse`] if nothing was generated.
    async fn generate(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
    ) -> Result<String, GenerationError>;

    /// The model identifier this client sends requests for.
    fn model_id(&self) -> &str;
}
