//! Persona pipeline: select history, assemble the prompt, generate, bound.
//!
//! Every stage is stateless and per-request; a failure at any stage aborts
//! the request and is reported to the caller as a [`PersonaError`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::bound::{bound, DEFAULT_TRUNCATION_MARKER, TELEGRAM_MAX_MESSAGE_CHARS};
use crate::history::{HistorySelector, SelectError};
use crate::prompt::{self, PromptTemplate, DEFAULT_SEPARATOR};
use crate::providers::{GenerationClient, GenerationError};
use crate::store::StoreError;

/// Default number of history records fetched per request.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Default character budget for the history section of the prompt.
pub const DEFAULT_PROMPT_CHAR_BUDGET: usize = 10_000;

/// Default user-turn instruction sent alongside the persona prompt.
pub const DEFAULT_USER_PROMPT: &str = "Send a short message.";

/// Errors from the persona pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersonaError {
    /// The member has no stored messages to learn from.
    #[error("no history for member")]
    NoHistory,

    /// The history store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The generation call failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl From<SelectError> for PersonaError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::NoHistory => Self::NoHistory,
            SelectError::Store(e) => Self::Store(e),
        }
    }
}

/// Tunables for prompt assembly and output bounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaSettings {
    /// Maximum number of records fetched from the history store.
    pub history_limit: usize,
    /// Character budget for the history section.
    pub prompt_char_budget: usize,
    /// Separator appended after every record.
    pub separator: String,
    /// System prompt template.
    pub template: PromptTemplate,
    /// User-turn instruction.
    pub user_prompt: String,
    /// Transport ceiling for the generated reply, in characters.
    pub max_message_chars: usize,
    /// Marker appended when the reply is cut.
    pub truncation_marker: String,
}

impl Default for PersonaSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            prompt_char_budget: DEFAULT_PROMPT_CHAR_BUDGET,
            separator: DEFAULT_SEPARATOR.to_owned(),
            template: PromptTemplate::default(),
            user_prompt: DEFAULT_USER_PROMPT.to_owned(),
            max_message_chars: TELEGRAM_MAX_MESSAGE_CHARS,
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_owned(),
        }
    }
}

/// Composes the history selector, prompt assembler, generation client and
/// output bounder.
pub struct PersonaService {
    selector: HistorySelector,
    generator: Arc<dyn GenerationClient>,
    settings: PersonaSettings,
}

impl std::fmt::Debug for PersonaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaService")
            .field("model", &self.generator.model_id())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PersonaService {
    /// Create a new persona service.
    pub fn new(
        selector: HistorySelector,
        generator: Arc<dyn GenerationClient>,
        settings: PersonaSettings,
    ) -> Self {
        Self {
            selector,
            generator,
            settings,
        }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &PersonaSettings {
        &self.settings
    }

    /// Assemble the persona system prompt for `member_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PersonaError::NoHistory`] if the member has no messages and
    /// [`PersonaError::Store`] if the history lookup fails.
    pub async fn build_persona_prompt(
        &self,
        member_id: &str,
        scope_key: Option<&str>,
    ) -> Result<String, PersonaError> {
        let records = self
            .selector
            .select(member_id, scope_key, self.settings.history_limit)
            .await?;
        let prompt = prompt::build_prompt(
            &records,
            self.settings.prompt_char_budget,
            &self.settings.separator,
            &self.settings.template,
        );
        debug!(
            member_id,
            records = records.len(),
            prompt_chars = prompt.chars().count(),
            "persona prompt assembled"
        );
        Ok(prompt)
    }

    /// Clamp `text` to the configured transport ceiling.
    pub fn bound_for_transport(&self, text: &str) -> String {
        bound(
            text,
            self.settings.max_message_chars,
            &self.settings.truncation_marker,
        )
    }

    /// Run the whole pipeline and return a reply ready to send.
    ///
    /// # Errors
    ///
    /// Returns the first [`PersonaError`] raised by any stage.
    pub async fn generate(
        &self,
        member_id: &str,
        scope_key: Option<&str>,
    ) -> Result<String, PersonaError> {
        let system_prompt = self.build_persona_prompt(member_id, scope_key).await?;
        let text = self
            .generator
            .generate(Some(&system_prompt), &self.settings.user_prompt)
            .await?;
        let reply = self.bound_for_transport(&text);
        info!(
            member_id,
            model = self.generator.model_id(),
            chars = reply.chars().count(),
            "persona reply generated"
        );
        Ok(reply)
    }
}
