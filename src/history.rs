//! History selection with a scoped-then-global fallback.
//!
//! A member's most representative messages are often not in the chat the
//! request came from, so the selector first asks for messages in the current
//! scope and widens to every scope only when that comes back empty.

use std::sync::Arc;

use tracing::debug;

use crate::store::{HistoryQuery, HistoryRecord, HistoryStore, StoreError};

/// Why a selection produced nothing to work with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// The member has no stored messages anywhere.
    #[error("no history for member")]
    NoHistory,

    /// The history store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Candidate queries, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Scoped,
    Global,
    Exhausted,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Self::Scoped => Self::Global,
            Self::Global | Self::Exhausted => Self::Exhausted,
        }
    }
}

/// Chooses which stored messages feed a persona prompt.
#[derive(Clone)]
pub struct HistorySelector {
    store: Arc<dyn HistoryStore>,
}

impl std::fmt::Debug for HistorySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistorySelector").finish_non_exhaustive()
    }
}

impl HistorySelector {
    /// Create a selector over `store`.
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Select up to `limit` of the member's messages, newest first.
    ///
    /// Tries `(member_id, scope_key)` first, then `member_id` alone. The first
    /// non-empty result wins. Without a `scope_key` only the global query runs.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::NoHistory`] when both queries are empty and
    /// [`SelectError::Store`] as soon as a query fails.
    pub async fn select(
        &self,
        member_id: &str,
        scope_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, SelectError> {
        let mut stage = if scope_key.is_some() {
            Stage::Scoped
        } else {
            Stage::Global
        };

        loop {
            let query = match (stage, scope_key) {
                (Stage::Scoped, Some(scope)) => HistoryQuery::member(member_id, limit).in_scope(scope),
                (Stage::Scoped, None) | (Stage::Global, _) => HistoryQuery::member(member_id, limit),
                (Stage::Exhausted, _) => return Err(SelectError::NoHistory),
            };

            let records = self.store.query(query).await?;
            if !records.is_empty() {
                debug!(member_id, ?stage, count = records.len(), "history selected");
                return Ok(records);
            }
            debug!(member_id, ?stage, "no history at this stage");
            stage = stage.next();
        }
    }
}
