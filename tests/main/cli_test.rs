//! CLI contract tests.

use std::sync::Arc;

use assert_cmd::Command;
use chrono::{TimeZone, Utc};
use doppel::store::sqlite::SqliteHistoryStore;
use doppel::store::{HistoryRecord, HistoryStore};

fn doppel(workdir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("doppel").expect("binary should build");
    cmd.current_dir(workdir)
        .env_remove("DOPPEL_CONFIG_PATH")
        .env_remove("DOPPEL_TELEGRAM_TOKEN")
        .env_remove("RUST_LOG")
        .env("DOPPEL_DATABASE_PATH", workdir.join("doppel.db"));
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn help_lists_subcommands() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = doppel(tmp.path())
        .arg("--help")
        .output()
        .expect("help should run");
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("members"));
    assert!(stdout.contains("prompt"));
}

#[test]
fn members_on_fresh_database_prints_nothing() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = doppel(tmp.path())
        .arg("members")
        .output()
        .expect("members should run");
    assert!(output.status.success());
    assert!(stdout_of(&output).trim().is_empty());
    assert!(tmp.path().join("doppel.db").exists());
}

#[test]
fn prompt_without_history_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = doppel(tmp.path())
        .args(["prompt", "--member", "42"])
        .output()
        .expect("prompt should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no history"));
}

#[test]
fn start_without_token_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = doppel(tmp.path())
        .arg("start")
        .output()
        .expect("start should run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DOPPEL_TELEGRAM_TOKEN"));
}

#[test]
fn explicit_missing_config_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = doppel(tmp.path())
        .args(["--config", "missing.toml", "members"])
        .output()
        .expect("members should run");
    assert!(!output.status.success());
}

#[tokio::test]
async fn prompt_prints_stored_history_without_llm_config() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let pool = doppel::db::open_pool(&tmp.path().join("doppel.db"), 1)
        .await
        .expect("pool should open");
    let store: Arc<dyn HistoryStore> = Arc::new(SqliteHistoryStore::new(pool.clone()));
    store
        .append(&HistoryRecord {
            message_id: "1:7".to_owned(),
            member_id: "42".to_owned(),
            scope_key: Some("1".to_owned()),
            content: "the quick brown fox".to_owned(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid time"),
            stored_at: None,
        })
        .await
        .expect("append should succeed");
    pool.close().await;

    let output = doppel(tmp.path())
        .env_remove("DOPPEL_LLM_API_URL")
        .env_remove("DOPPEL_LLM_API_KEY")
        .args(["prompt", "--member", "42"])
        .output()
        .expect("prompt should run");
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("the quick brown fox"));
}

#[test]
fn manifest_does_not_enable_unused_reqwest_streaming() {
    let manifest = std::fs::read_to_string(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml"),
    )
    .expect("manifest should be readable");
    let reqwest_line = manifest
        .lines()
        .find(|line| line.starts_with("reqwest"))
        .expect("reqwest should be a dependency");
    assert!(!reqwest_line.contains("stream"));
}
