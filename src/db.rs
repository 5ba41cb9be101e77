//! SQLite pool bootstrap.
//!
//! The schema is applied inline via `include_str!` every time a pool is
//! opened; every statement in it is idempotent.

use std::path::Path;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Schema for the `members` and `messages` tables.
pub const SCHEMA_SQL: &str = include_str!("../migrations/001_schema.sql");

/// Open (or create) the database at `path` and apply the schema.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, the database
/// cannot be opened, or the schema fails to apply.
pub async fn open_pool(path: &Path, max_connections: u32) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .pragma("trusted_schema", "OFF");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    apply_schema(&pool).await?;
    info!(path = %path.display(), "database ready");
    Ok(pool)
}

/// Apply the schema to an existing pool.
///
/// # Errors
///
/// Returns an error if any schema statement fails.
pub async fn apply_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("failed to apply schema")?;
    Ok(())
}
