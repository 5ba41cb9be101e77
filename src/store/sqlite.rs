//! SQLite implementations of the member and history stores.
//!
//! Both stores share one [`SqlitePool`]; the schema lives in
//! `migrations/001_schema.sql` and is applied by [`crate::db::open_pool`].
//! Timestamps are stored as unix milliseconds so `ORDER BY created_at`
//! is a plain integer sort.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, trace};

use super::{HistoryQuery, HistoryRecord, HistoryStore, Member, MembershipStore, StoreError};

/// Map a driver error onto the store taxonomy.
fn classify(err: sqlx::Error, key: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateKey(key.to_owned())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Unavailable(format!("invalid timestamp {millis}")))
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Member registry backed by the `members` table.
#[derive(Debug, Clone)]
pub struct SqliteMembershipStore {
    db: SqlitePool,
}

impl SqliteMembershipStore {
    /// Create a store over an already migrated pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT member_id FROM members")
            .fetch_all(&self.db)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert(&self, member_id: &str) -> Result<Member, StoreError> {
        let now = Utc::now();
        let millis = now.timestamp_millis();
        sqlx::query("INSERT INTO members (member_id, registered_at, updated_at) VALUES (?1, ?2, ?2)")
            .bind(member_id)
            .bind(millis)
            .execute(&self.db)
            .await
            .map_err(|e| classify(e, member_id))?;
        debug!(member_id, "member row inserted");

        // Round-trip through millis so the returned record matches what a
        // later read would produce.
        let stamp = from_millis(millis)?;
        Ok(Member {
            member_id: member_id.to_owned(),
            registered_at: stamp,
            updated_at: stamp,
        })
    }

    async fn exists(&self, member_id: &str) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM members WHERE member_id = ?1")
            .bind(member_id)
            .fetch_optional(&self.db)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(row.is_some())
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Message log backed by the `messages` table.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    db: SqlitePool,
}

impl SqliteHistoryStore {
    /// Create a store over an already migrated pool.
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

type MessageRow = (String, String, Option<String>, String, i64, i64);

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn query(&self, query: HistoryQuery<'_>) -> Result<Vec<HistoryRecord>, StoreError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let before = query.before.map(|t| t.timestamp_millis());

        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT message_id, member_id, scope_key, content, created_at, stored_at \
             FROM messages \
             WHERE member_id = ?1 \
               AND (?2 IS NULL OR scope_key = ?2) \
               AND (?3 IS NULL OR created_at < ?3) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT ?4",
        )
        .bind(query.member_id)
        .bind(query.scope_key)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        trace!(
            member_id = query.member_id,
            scope_key = ?query.scope_key,
            rows = rows.len(),
            "history query"
        );

        rows.into_iter()
            .map(
                |(message_id, member_id, scope_key, content, created_at, stored_at)| {
                    Ok(HistoryRecord {
                        message_id,
                        member_id,
                        scope_key,
                        content,
                        created_at: from_millis(created_at)?,
                        stored_at: Some(from_millis(stored_at)?),
                    })
                },
            )
            .collect()
    }

    async fn append(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        let stored_at = record.stored_at.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            "INSERT INTO messages (message_id, member_id, scope_key, content, created_at, stored_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (message_id) DO NOTHING",
        )
        .bind(&record.message_id)
        .bind(&record.member_id)
        .bind(&record.scope_key)
        .bind(&record.content)
        .bind(record.created_at.timestamp_millis())
        .bind(stored_at.timestamp_millis())
        .execute(&self.db)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if result.rows_affected() == 0 {
            trace!(message_id = %record.message_id, "duplicate message ignored");
        }
        Ok(())
    }
}
