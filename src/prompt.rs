//! Persona prompt assembly under a character budget.
//!
//! Records arrive newest first. They are folded into the prompt greedily:
//! each record costs its content length plus the separator length, and the
//! first record that would overflow the budget ends the fold. Nothing after
//! it is considered, even if a later record is short enough to fit, so the
//! prompt always holds an unbroken run of the most recent messages.
//!
//! Lengths are counted in characters (`char`s), never bytes.

use crate::store::HistoryRecord;

/// Placeholder replaced by the selected history text.
pub const HISTORY_PLACEHOLDER: &str = "{history}";

/// Separator appended after every accepted record.
pub const DEFAULT_SEPARATOR: &str = "\n---\n";

/// Default instructional template for persona generation.
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are role-playing a chat user whose message history is shown below.

## This user's messages (newest first):
{history}

## Instructions:
- Study the writing style, tone, word choice, emoji use and favourite topics in the history above
- Write one message naturally, as this user
- Reproduce any distinctive expressions or habits found in the history
- Do not quote the history verbatim or reveal that you are imitating someone";

/// Template validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The template has no `{history}` placeholder.
    #[error("prompt template is missing the {{history}} placeholder")]
    MissingPlaceholder,

    /// The template has more than one `{history}` placeholder.
    #[error("prompt template has more than one {{history}} placeholder")]
    DuplicatePlaceholder,
}

/// An instructional template with exactly one history placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    prefix: String,
    suffix: String,
}

impl PromptTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] unless `{history}` occurs exactly once.
    pub fn new(template: &str) -> Result<Self, TemplateError> {
        let (prefix, suffix) = template
            .split_once(HISTORY_PLACEHOLDER)
            .ok_or(TemplateError::MissingPlaceholder)?;
        if suffix.contains(HISTORY_PLACEHOLDER) {
            return Err(TemplateError::DuplicatePlaceholder);
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
        })
    }

    /// Substitute `history` into the placeholder.
    pub fn render(&self, history: &str) -> String {
        let mut out = String::with_capacity(
            self.prefix
                .len()
                .saturating_add(history.len())
                .saturating_add(self.suffix.len()),
        );
        out.push_str(&self.prefix);
        out.push_str(history);
        out.push_str(&self.suffix);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        let (prefix, suffix) = DEFAULT_SYSTEM_TEMPLATE
            .split_once(HISTORY_PLACEHOLDER)
            .unwrap_or((DEFAULT_SYSTEM_TEMPLATE, ""));
        Self {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
        }
    }
}

/// Concatenate the newest records that fit in `char_budget`.
///
/// Returns the accepted text (each record followed by `separator`) and the
/// number of records accepted.
pub fn select_within_budget(
    records: &[HistoryRecord],
    char_budget: usize,
    separator: &str,
) -> (String, usize) {
    let separator_len = separator.chars().count();
    let mut used: usize = 0;
    let mut accepted: usize = 0;
    let mut text = String::new();

    for record in records {
        let cost = record.content.chars().count().saturating_add(separator_len);
        let total = used.saturating_add(cost);
        if total > char_budget {
            break;
        }
        text.push_str(&record.content);
        text.push_str(separator);
        used = total;
        accepted = accepted.saturating_add(1);
    }

    (text, accepted)
}

/// Build the full persona prompt from newest-first `records`.
///
/// An empty selection still renders the template, with an empty history
/// section; callers decide whether that is usable.
pub fn build_prompt(
    records: &[HistoryRecord],
    char_budget: usize,
    separator: &str,
    template: &PromptTemplate,
) -> String {
    let (history, _) = select_within_budget(records, char_budget, separator);
    template.render(&history)
}
