//! Backing-store contracts for members and message history.
//!
//! The bot core only talks to the [`MembershipStore`] and [`HistoryStore`]
//! traits. [`sqlite`] provides the production implementations; tests plug in
//! their own stores to inject failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod sqlite;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A registered member as recorded by the membership store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Platform-assigned user identifier.
    pub member_id: String,
    /// When the member registered.
    pub registered_at: DateTime<Utc>,
    /// When the record was last touched.
    pub updated_at: DateTime<Utc>,
}

/// One stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Store-wide unique message identifier.
    pub message_id: String,
    /// Author of the message.
    pub member_id: String,
    /// Grouping key the message was posted under (the chat id).
    pub scope_key: Option<String>,
    /// Message text.
    pub content: String,
    /// When the message was posted on the platform.
    pub created_at: DateTime<Utc>,
    /// When the store ingested the message (`None` until stored).
    pub stored_at: Option<DateTime<Utc>>,
}

/// Parameters for a history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery<'a> {
    /// Author to fetch messages for.
    pub member_id: &'a str,
    /// Restrict to one grouping key; `None` searches every scope.
    pub scope_key: Option<&'a str>,
    /// Maximum number of records returned.
    pub limit: usize,
    /// Only return messages created strictly before this instant.
    pub before: Option<DateTime<Utc>>,
}

impl<'a> HistoryQuery<'a> {
    /// Newest messages of `member_id` across all scopes.
    pub fn member(member_id: &'a str, limit: usize) -> Self {
        Self {
            member_id,
            scope_key: None,
            limit,
            before: None,
        }
    }

    /// Narrow the query to a single grouping key.
    pub fn in_scope(mut self, scope_key: &'a str) -> Self {
        self.scope_key = Some(scope_key);
        self
    }

    /// Page backwards from `before`.
    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by the backing stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store is unreachable or the operation failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An insert collided with an existing key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Durable registry of members.
///
/// The store is the authority on uniqueness: [`MembershipStore::insert`]
/// reports [`StoreError::DuplicateKey`] for an id that is already present.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// List every registered member id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the listing fails.
    async fn list_all(&self) -> Result<Vec<String>, StoreError>;

    /// Register a new member.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the id already exists, or
    /// [`StoreError::Unavailable`] on any other failure.
    async fn insert(&self, member_id: &str) -> Result<Member, StoreError>;

    /// Check a single id directly against the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lookup fails.
    async fn exists(&self, member_id: &str) -> Result<bool, StoreError>;
}

/// Durable, time-ordered log of member messages.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetch records matching `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the query fails.
    async fn query(&self, query: HistoryQuery<'_>) -> Result<Vec<HistoryRecord>, StoreError>;

    /// Store a record. Appending an already stored `message_id` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the write fails.
    async fn append(&self, record: &HistoryRecord) -> Result<(), StoreError>;
}
